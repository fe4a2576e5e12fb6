use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum NefError {
    #[error("invalid breakpoints: {0}")]
    InvalidBreakpoints(String),
    #[error("unknown {kind} handle #{index}")]
    UnknownHandle { kind: &'static str, index: usize },
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("decoder solve failed: {0}")]
    Solver(String),
}

pub type NefResult<T, E = NefError> = core::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            NefError::InvalidBreakpoints("times must increase".into()).to_string(),
            "invalid breakpoints: times must increase"
        );
        assert_eq!(
            NefError::UnknownHandle { kind: "node", index: 3 }.to_string(),
            "unknown node handle #3"
        );
        assert_eq!(
            NefError::DimensionMismatch("2 != 1".into()).to_string(),
            "dimension mismatch: 2 != 1"
        );
        assert_eq!(
            NefError::Solver("not positive definite".into()).to_string(),
            "decoder solve failed: not positive definite"
        );
    }

    #[test]
    fn result_alias_propagates() {
        fn may_fail(ok: bool) -> NefResult<u32> {
            if ok { Ok(7) } else { Err(NefError::InvalidParameter("radius".into())) }
        }
        fn outer(ok: bool) -> NefResult<u32> {
            Ok(may_fail(ok)? + 1)
        }
        assert_eq!(outer(true), Ok(8));
        assert!(matches!(outer(false), Err(NefError::InvalidParameter(_))));
    }
}
