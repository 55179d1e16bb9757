// Modified from https://github.com/zeta12ti/Checked/blob/master/src/num.rs
// Original license:
// MIT License
//
// Copyright (c) 2017 zeta12ti
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Overflow-checked arithmetic for the chunk index and size math used throughout the crate.

use std::{
    convert::TryFrom,
    fmt,
    ops::{Add, Div, Mul, Rem, Sub},
};

/// An integer whose arithmetic operations saturate into an error state on overflow instead of
/// panicking or wrapping. Unwrap with [`get`](Checked::get) at the end of a computation.
#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub(crate) struct Checked<T>(pub(crate) Option<T>);

impl<T> Checked<T> {
    pub(crate) fn new(x: T) -> Checked<T> {
        Checked(Some(x))
    }

    pub(crate) fn try_from<F>(value: F) -> crate::error::Result<Self>
    where
        T: TryFrom<F>,
        T::Error: fmt::Display,
    {
        value
            .try_into()
            .map(|v| Self(Some(v)))
            .map_err(|e| crate::error::Error::invalid_argument(format!("{e}")))
    }

    pub(crate) fn get(self) -> crate::error::Result<T> {
        self.0
            .ok_or_else(|| crate::error::Error::invalid_argument("checked arithmetic failure"))
    }

    pub(crate) fn try_into<F>(self) -> crate::error::Result<F>
    where
        T: TryInto<F>,
        T::Error: fmt::Display,
    {
        self.get().and_then(|v| {
            v.try_into()
                .map_err(|e| crate::error::Error::invalid_argument(format!("{e}")))
        })
    }
}

impl<T: fmt::Debug> fmt::Debug for Checked<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0 {
            Some(ref x) => x.fmt(f),
            None => "overflow".fmt(f),
        }
    }
}

macro_rules! checked_impl {
    ($($t:ty)*) => {
        $(
            impl Add for Checked<$t> {
                type Output = Checked<$t>;

                fn add(self, rhs: Checked<$t>) -> Checked<$t> {
                    match (self.0, rhs.0) {
                        (Some(x), Some(y)) => Checked(x.checked_add(y)),
                        _ => Checked(None),
                    }
                }
            }

            impl Add<$t> for Checked<$t> {
                type Output = Checked<$t>;

                fn add(self, rhs: $t) -> Checked<$t> {
                    self + Checked::new(rhs)
                }
            }

            impl Sub for Checked<$t> {
                type Output = Checked<$t>;

                fn sub(self, rhs: Checked<$t>) -> Checked<$t> {
                    match (self.0, rhs.0) {
                        (Some(x), Some(y)) => Checked(x.checked_sub(y)),
                        _ => Checked(None),
                    }
                }
            }

            impl Sub<$t> for Checked<$t> {
                type Output = Checked<$t>;

                fn sub(self, rhs: $t) -> Checked<$t> {
                    self - Checked::new(rhs)
                }
            }

            impl Mul for Checked<$t> {
                type Output = Checked<$t>;

                fn mul(self, rhs: Checked<$t>) -> Checked<$t> {
                    match (self.0, rhs.0) {
                        (Some(x), Some(y)) => Checked(x.checked_mul(y)),
                        _ => Checked(None),
                    }
                }
            }

            impl Mul<$t> for Checked<$t> {
                type Output = Checked<$t>;

                fn mul(self, rhs: $t) -> Checked<$t> {
                    self * Checked::new(rhs)
                }
            }

            impl Div for Checked<$t> {
                type Output = Checked<$t>;

                fn div(self, rhs: Checked<$t>) -> Checked<$t> {
                    match (self.0, rhs.0) {
                        (Some(x), Some(y)) => Checked(x.checked_div(y)),
                        _ => Checked(None),
                    }
                }
            }

            impl Div<$t> for Checked<$t> {
                type Output = Checked<$t>;

                fn div(self, rhs: $t) -> Checked<$t> {
                    self / Checked::new(rhs)
                }
            }

            impl Rem for Checked<$t> {
                type Output = Checked<$t>;

                fn rem(self, rhs: Checked<$t>) -> Checked<$t> {
                    match (self.0, rhs.0) {
                        (Some(x), Some(y)) => Checked(x.checked_rem(y)),
                        _ => Checked(None),
                    }
                }
            }

            impl Rem<$t> for Checked<$t> {
                type Output = Checked<$t>;

                fn rem(self, rhs: $t) -> Checked<$t> {
                    self % Checked::new(rhs)
                }
            }
        )*
    };
}

checked_impl! { u32 u64 usize }
