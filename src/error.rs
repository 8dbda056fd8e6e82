use thiserror::Error;

/// Failures the core reports to its caller. All of them are locally
/// recoverable: callers still get a scene (possibly a placeholder).
#[derive(Debug, Error)]
pub enum TourViewError {
    #[error("no points to project")]
    EmptyGeometry,

    #[error("malformed solution: {reason}")]
    MalformedSolution { reason: String },

    #[error("selection index {index} out of range (point count {len})")]
    SelectionOutOfRange { index: usize, len: usize },

    #[error("viewport {width}x{height} has no drawable area")]
    InvalidViewport { width: u32, height: u32 },

    #[error("solution is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl TourViewError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedSolution {
            reason: reason.into(),
        }
    }
}

impl PartialEq for TourViewError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::EmptyGeometry, Self::EmptyGeometry) => true,
            (Self::MalformedSolution { reason: a }, Self::MalformedSolution { reason: b }) => a == b,
            (
                Self::SelectionOutOfRange { index: a, len: la },
                Self::SelectionOutOfRange { index: b, len: lb },
            ) => a == b && la == lb,
            (
                Self::InvalidViewport {
                    width: wa,
                    height: ha,
                },
                Self::InvalidViewport {
                    width: wb,
                    height: hb,
                },
            ) => wa == wb && ha == hb,
            (Self::Json(a), Self::Json(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TourViewError>;
