// This file is part of eth-block-indexer.
// Copyright (C) 2025 Midnight Foundation
// SPDX-License-Identifier: Apache-2.0

use std::error::Error as StdError;

/// Boxed error, e.g. to be used as trait object.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Extension methods for [StdError].
pub trait StdErrorExt
where
    Self: StdError,
{
    /// Format this error along with its chain of sources, separated by colons.
    fn as_chain(&self) -> String {
        let mut chain = vec![self.to_string()];

        let mut source = self.source();
        while let Some(error) = source {
            chain.push(error.to_string());
            source = error.source();
        }

        chain.join(": ")
    }
}

impl<T> StdErrorExt for T where T: StdError {}

#[cfg(test)]
mod tests {
    use crate::error::StdErrorExt;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("outer")]
    struct Outer(#[source] Inner);

    #[derive(Debug, Error)]
    #[error("inner")]
    struct Inner;

    #[test]
    fn test_as_chain() {
        assert_eq!(Inner.as_chain(), "inner");
        assert_eq!(Outer(Inner).as_chain(), "outer: inner");
    }
}
