use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Encoder used for resized derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivativeFormat {
    WebP,
    Jpeg,
    Png,
}

impl DerivativeFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DerivativeFormat::WebP => "webp",
            DerivativeFormat::Jpeg => "jpg",
            DerivativeFormat::Png => "png",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            DerivativeFormat::WebP => "image/webp",
            DerivativeFormat::Jpeg => "image/jpeg",
            DerivativeFormat::Png => "image/png",
        }
    }
}

impl FromStr for DerivativeFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "webp" => Ok(DerivativeFormat::WebP),
            "jpg" | "jpeg" => Ok(DerivativeFormat::Jpeg),
            "png" => Ok(DerivativeFormat::Png),
            _ => Err(anyhow::anyhow!("Invalid derivative format: {}", s)),
        }
    }
}

impl Display for DerivativeFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.extension())
    }
}

/// One configured output: width plus format. The configured list is ordered and fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivativeSpec {
    pub target_width: u32,
    pub output_format: DerivativeFormat,
}

impl DerivativeSpec {
    pub fn new(target_width: u32, output_format: DerivativeFormat) -> Self {
        Self {
            target_width,
            output_format,
        }
    }
}

/// Result for one derivative of one processing invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    pub derivative_path: String,
    /// `None` for a passthrough copy.
    pub width: Option<u32>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingOutcome {
    pub fn succeeded(derivative_path: String, width: Option<u32>) -> Self {
        Self {
            derivative_path,
            width,
            success: true,
            error: None,
        }
    }

    pub fn failed(derivative_path: String, width: Option<u32>, error: impl Into<String>) -> Self {
        Self {
            derivative_path,
            width,
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    /// Source format is not on the allow-list; nothing was written.
    Skipped,
    /// Original copied verbatim.
    Passthrough,
    /// Every derivative written.
    Complete,
    /// At least one derivative failed.
    Partial,
}

/// Aggregate of one processing invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub original_path: String,
    pub status: BatchStatus,
    pub outcomes: Vec<ProcessingOutcome>,
}

impl BatchOutcome {
    pub fn skipped(original_path: impl Into<String>) -> Self {
        Self {
            original_path: original_path.into(),
            status: BatchStatus::Skipped,
            outcomes: Vec::new(),
        }
    }

    /// Aggregate resized outcomes; any failure makes the batch partial.
    pub fn from_outcomes(original_path: impl Into<String>, outcomes: Vec<ProcessingOutcome>) -> Self {
        let status = if outcomes.iter().all(|o| o.success) {
            BatchStatus::Complete
        } else {
            BatchStatus::Partial
        };
        Self {
            original_path: original_path.into(),
            status,
            outcomes,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.status == BatchStatus::Partial
    }

    pub fn failures(&self) -> impl Iterator<Item = &ProcessingOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    pub fn failed_widths(&self) -> Vec<u32> {
        self.failures().filter_map(|o| o.width).collect()
    }

    /// `200` when nothing failed, `207` on partial failure.
    pub fn http_status(&self) -> u16 {
        if self.is_partial() {
            207
        } else {
            200
        }
    }
}
