use std::fmt;
use std::sync::Arc;

use crate::certificate::{CertVerifier, TlsCertificate};
use crate::compression::Compression;
use crate::crypto::{rust_crypto, CryptoProvider};
use crate::session::SessionCache;
use crate::types::{CipherSuite, ProtocolVersion};
use crate::Error;

/// Whether a server asks for a client certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientAuth {
    /// No CertificateRequest is sent.
    #[default]
    None,
    /// A CertificateRequest is sent, an empty Certificate is accepted.
    Optional,
    /// A CertificateRequest is sent, an empty Certificate fails the handshake.
    Required,
}

/// TLS configuration
#[derive(Clone)]
pub struct Config {
    cipher_suites: Vec<CipherSuite>,
    min_version: ProtocolVersion,
    max_version: ProtocolVersion,
    client_auth: ClientAuth,
    certificate: Option<TlsCertificate>,
    cert_verifier: Option<Arc<dyn CertVerifier>>,
    session_cache: Option<Arc<dyn SessionCache>>,
    compression: Option<Arc<dyn Compression>>,
    certificate_authorities: Vec<Vec<u8>>,
    crypto_provider: CryptoProvider,
    rng_seed: Option<u64>,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            cipher_suites: None,
            min_version: ProtocolVersion::TLS1_0,
            max_version: ProtocolVersion::TLS1_1,
            client_auth: ClientAuth::None,
            certificate: None,
            cert_verifier: None,
            session_cache: None,
            compression: None,
            certificate_authorities: Vec::new(),
            crypto_provider: None,
            rng_seed: None,
        }
    }

    /// Enabled cipher suites in preference order.
    ///
    /// A client offers them in this order. A server walks the client's list
    /// and picks the first one also enabled here.
    #[inline(always)]
    pub fn cipher_suites(&self) -> &[CipherSuite] {
        &self.cipher_suites
    }

    /// Lowest protocol version accepted.
    #[inline(always)]
    pub fn min_version(&self) -> ProtocolVersion {
        self.min_version
    }

    /// Highest protocol version. Clients offer this.
    #[inline(always)]
    pub fn max_version(&self) -> ProtocolVersion {
        self.max_version
    }

    /// For a server, whether to request a client certificate.
    #[inline(always)]
    pub fn client_auth(&self) -> ClientAuth {
        self.client_auth
    }

    /// Our certificate chain and key.
    ///
    /// Mandatory for a server. For a client, sent when the server asks.
    #[inline(always)]
    pub fn certificate(&self) -> Option<&TlsCertificate> {
        self.certificate.as_ref()
    }

    /// Verifier for the peer's chain.
    ///
    /// Without one every chain is accepted and left to the application,
    /// which sees it as [`Output::PeerCert`](crate::Output::PeerCert).
    #[inline(always)]
    pub fn cert_verifier(&self) -> Option<&Arc<dyn CertVerifier>> {
        self.cert_verifier.as_ref()
    }

    /// Cache for session resumption.
    #[inline(always)]
    pub fn session_cache(&self) -> Option<&Arc<dyn SessionCache>> {
        self.session_cache.as_ref()
    }

    /// Deflate hooks. When set, compression method 1 is offered and accepted.
    #[inline(always)]
    pub fn compression(&self) -> Option<&Arc<dyn Compression>> {
        self.compression.as_ref()
    }

    /// DER distinguished names sent in a CertificateRequest.
    #[inline(always)]
    pub fn certificate_authorities(&self) -> &[Vec<u8>] {
        &self.certificate_authorities
    }

    /// Cryptographic provider.
    ///
    /// Provides all cryptographic operations (ciphers, key transport, signing, etc.).
    #[inline(always)]
    pub fn crypto_provider(&self) -> &CryptoProvider {
        &self.crypto_provider
    }

    /// Seed for deterministic randomness in tests. `None` in production.
    #[inline(always)]
    pub fn rng_seed(&self) -> Option<u64> {
        self.rng_seed
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("cipher_suites", &self.cipher_suites)
            .field("min_version", &self.min_version)
            .field("max_version", &self.max_version)
            .field("client_auth", &self.client_auth)
            .field("certificate", &self.certificate)
            .field("cert_verifier", &self.cert_verifier.is_some())
            .field("session_cache", &self.session_cache.is_some())
            .field("compression", &self.compression.is_some())
            .field("rng_seed", &self.rng_seed.is_some())
            .finish()
    }
}

/// Builder for TLS configuration.
pub struct ConfigBuilder {
    cipher_suites: Option<Vec<CipherSuite>>,
    min_version: ProtocolVersion,
    max_version: ProtocolVersion,
    client_auth: ClientAuth,
    certificate: Option<TlsCertificate>,
    cert_verifier: Option<Arc<dyn CertVerifier>>,
    session_cache: Option<Arc<dyn SessionCache>>,
    compression: Option<Arc<dyn Compression>>,
    certificate_authorities: Vec<Vec<u8>>,
    crypto_provider: Option<CryptoProvider>,
    rng_seed: Option<u64>,
}

impl ConfigBuilder {
    /// Set the enabled cipher suites in preference order.
    ///
    /// Defaults to every suite of the crypto provider, in its order.
    pub fn cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.cipher_suites = Some(suites.to_vec());
        self
    }

    /// Set the lowest accepted protocol version.
    ///
    /// Defaults to TLS 1.0.
    pub fn min_version(mut self, version: ProtocolVersion) -> Self {
        self.min_version = version;
        self
    }

    /// Set the highest protocol version.
    ///
    /// Defaults to TLS 1.1.
    pub fn max_version(mut self, version: ProtocolVersion) -> Self {
        self.max_version = version;
        self
    }

    /// Set whether a server requests client certificates.
    ///
    /// Defaults to [`ClientAuth::None`].
    pub fn client_auth(mut self, client_auth: ClientAuth) -> Self {
        self.client_auth = client_auth;
        self
    }

    /// Set our certificate chain and private key.
    pub fn certificate(mut self, certificate: TlsCertificate) -> Self {
        self.certificate = Some(certificate);
        self
    }

    /// Set the verifier for the peer's certificate chain.
    pub fn cert_verifier(mut self, verifier: Arc<dyn CertVerifier>) -> Self {
        self.cert_verifier = Some(verifier);
        self
    }

    /// Set the session cache. The same cache is usually shared by many configs.
    pub fn session_cache(mut self, cache: Arc<dyn SessionCache>) -> Self {
        self.session_cache = Some(cache);
        self
    }

    /// Set deflate hooks for record compression.
    pub fn compression(mut self, compression: Arc<dyn Compression>) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Set the DER distinguished names advertised in a CertificateRequest.
    pub fn certificate_authorities(mut self, names: Vec<Vec<u8>>) -> Self {
        self.certificate_authorities = names;
        self
    }

    /// Set a custom crypto provider.
    ///
    /// If not set, the process default or the RustCrypto provider is used.
    pub fn with_crypto_provider(mut self, provider: CryptoProvider) -> Self {
        self.crypto_provider = Some(provider);
        self
    }

    /// Seed the engine's random source.
    ///
    /// Makes handshakes reproducible. Never use outside tests.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Build the configuration.
    ///
    /// Returns `Error::ConfigError` if the combination is unusable.
    ///
    /// The crypto provider is selected in the following priority order:
    /// 1. Explicit provider set via `with_crypto_provider()`
    /// 2. Default provider installed via `CryptoProvider::install_default()`
    /// 3. The RustCrypto provider
    pub fn build(self) -> Result<Config, Error> {
        let crypto_provider = self
            .crypto_provider
            .or_else(|| CryptoProvider::get_default().cloned())
            .unwrap_or_else(rust_crypto::default_provider);

        crypto_provider.validate().map_err(Error::ConfigError)?;

        let cipher_suites = match self.cipher_suites {
            Some(suites) => suites,
            None => crypto_provider
                .cipher_suites
                .iter()
                .map(|s| s.suite())
                .collect(),
        };

        if cipher_suites.is_empty() {
            return Err(Error::ConfigError("No cipher suites enabled".to_string()));
        }
        for suite in &cipher_suites {
            if crypto_provider.find_cipher_suite(*suite).is_none() {
                return Err(Error::ConfigError(format!(
                    "Cipher suite {} not supported by the crypto provider",
                    suite
                )));
            }
        }

        for v in [self.min_version, self.max_version] {
            if !matches!(v, ProtocolVersion::TLS1_0 | ProtocolVersion::TLS1_1) {
                return Err(Error::ConfigError(format!("Unsupported version {}", v)));
            }
        }
        if self.min_version > self.max_version {
            return Err(Error::ConfigError(
                "min_version is above max_version".to_string(),
            ));
        }

        if let Some(cert) = &self.certificate {
            if cert.chain.is_empty() {
                return Err(Error::ConfigError("Empty certificate chain".to_string()));
            }
            if let Some(key) = &cert.private_key {
                crypto_provider
                    .key_provider
                    .load_private_key(key)
                    .map_err(Error::ConfigError)?;
            }
        }

        Ok(Config {
            cipher_suites,
            min_version: self.min_version,
            max_version: self.max_version,
            client_auth: self.client_auth,
            certificate: self.certificate,
            cert_verifier: self.cert_verifier,
            session_cache: self.session_cache,
            compression: self.compression,
            certificate_authorities: self.certificate_authorities,
            crypto_provider,
            rng_seed: self.rng_seed,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        let crypto_provider = CryptoProvider::get_default()
            .cloned()
            .unwrap_or_else(rust_crypto::default_provider);

        Config {
            cipher_suites: CipherSuite::all().to_vec(),
            min_version: ProtocolVersion::TLS1_0,
            max_version: ProtocolVersion::TLS1_1,
            client_auth: ClientAuth::None,
            certificate: None,
            cert_verifier: None,
            session_cache: None,
            compression: None,
            certificate_authorities: Vec::new(),
            crypto_provider,
            rng_seed: None,
        }
    }
}
