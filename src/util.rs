use nom::error::{ErrorKind, ParseError};
use nom::{Err, IResult, InputLength, Parser};
use tinyvec::{Array, ArrayVec};

#[inline(always)]
pub fn many0<I, O, E, F, A>(mut f: F) -> impl FnMut(I) -> IResult<I, ArrayVec<A>, E>
where
    I: Clone + InputLength,
    F: Parser<I, O, E>,
    E: ParseError<I>,
    A: Array<Item = O>,
{
    move |mut i: I| {
        let mut acc = ArrayVec::default();
        loop {
            let len = i.input_len();
            if len == 0 {
                return Ok((i, acc));
            }
            match f.parse(i.clone()) {
                Err(Err::Error(_)) => return Ok((i, acc)),
                Err(e) => return Err(e),
                Ok((i1, o)) => {
                    // infinite loop check: the parser must always consume
                    if i1.input_len() == len {
                        return Err(Err::Error(E::from_error_kind(i, ErrorKind::Many0)));
                    }
                    if acc.len() == acc.capacity() {
                        return Err(Err::Failure(E::from_error_kind(i, ErrorKind::TooLarge)));
                    }

                    i = i1;
                    acc.push(o);
                }
            }
        }
    }
}

#[inline(always)]
pub fn many1<I, O, E, F, A>(mut f: F) -> impl FnMut(I) -> IResult<I, ArrayVec<A>, E>
where
    I: Clone + InputLength,
    F: Parser<I, O, E>,
    E: ParseError<I>,
    A: Array<Item = O>,
{
    let mut inner = many0(move |i: I| f.parse(i));
    move |i: I| {
        let (rest, acc) = inner(i.clone())?;
        if acc.is_empty() {
            return Err(Err::Error(E::from_error_kind(i, ErrorKind::Many1)));
        }
        Ok((rest, acc))
    }
}

/// Compare two byte strings without an early exit on the first difference.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
