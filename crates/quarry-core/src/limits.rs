//! Input validation limits for export requests

/// Records fetched per page, in both discovery and explicit-id mode
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Maximum page size accepted from configuration (1000)
pub const MAX_PAGE_SIZE: usize = 1000;

/// Default traversal depth for an export run
pub const DEFAULT_DEPTH: u32 = 5;

/// Maximum traversal depth (20)
pub const MAX_DEPTH: u32 = 20;

/// Validation error type
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    DepthTooLarge { depth: u32, max: u32 },
    ZeroDepth,
    PageSizeTooLarge { size: usize, max: usize },
    ZeroPageSize,
    EmptyScope,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DepthTooLarge { depth, max } => {
                write!(f, "Depth too large: {} (max {})", depth, max)
            }
            Self::ZeroDepth => write!(f, "Depth must be at least 1"),
            Self::PageSizeTooLarge { size, max } => {
                write!(f, "Page size too large: {} (max {})", size, max)
            }
            Self::ZeroPageSize => write!(f, "Page size must be at least 1"),
            Self::EmptyScope => write!(f, "Export scope cannot be empty"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate traversal depth
pub fn validate_depth(depth: u32) -> Result<(), ValidationError> {
    if depth == 0 {
        return Err(ValidationError::ZeroDepth);
    }
    if depth > MAX_DEPTH {
        return Err(ValidationError::DepthTooLarge {
            depth,
            max: MAX_DEPTH,
        });
    }
    Ok(())
}

/// Validate page size
pub fn validate_page_size(size: usize) -> Result<(), ValidationError> {
    if size == 0 {
        return Err(ValidationError::ZeroPageSize);
    }
    if size > MAX_PAGE_SIZE {
        return Err(ValidationError::PageSizeTooLarge {
            size,
            max: MAX_PAGE_SIZE,
        });
    }
    Ok(())
}

/// Validate an export scope string
pub fn validate_scope(scope: &str) -> Result<(), ValidationError> {
    if scope.trim().is_empty() {
        return Err(ValidationError::EmptyScope);
    }
    Ok(())
}
