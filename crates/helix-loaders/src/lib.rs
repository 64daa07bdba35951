//! HelixGraph Domain Loaders
//!
//! HR, marketing and procurement datasets expressed as schema definitions and
//! declared load stages for [`helix_graph::GraphLoader`].

pub mod flatten;
pub mod hr;
pub mod marketing;
pub mod procurement;
pub mod procurement_csv;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use helix_core::HelixError;
use helix_graph::DomainLoader;

pub use hr::HrLoader;
pub use marketing::MarketingLoader;
pub use procurement::ProcurementLoader;
pub use procurement_csv::ProcurementCsvLoader;

/// The datasets this crate knows how to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Hr,
    Marketing,
    Procurement,
    /// The generator's CSV exports, one file per entity.
    ProcurementCsv,
}

impl Domain {
    pub const ALL: [Domain; 4] = [
        Domain::Hr,
        Domain::Marketing,
        Domain::Procurement,
        Domain::ProcurementCsv,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hr => "hr",
            Self::Marketing => "marketing",
            Self::Procurement => "procurement",
            Self::ProcurementCsv => "procurement-csv",
        }
    }

    /// Where the domain's data lives under a data directory.
    pub fn default_data(&self, data_dir: &Path) -> PathBuf {
        match self {
            Self::ProcurementCsv => data_dir.join("procurement_csv"),
            _ => data_dir.join(self.as_str()),
        }
    }

    /// Build the loader. HR and the procurement CSV exports take a directory;
    /// the other domains take their dataset file, or a directory holding it.
    pub fn loader(&self, data: &Path) -> Box<dyn DomainLoader> {
        match self {
            Self::Hr => Box::new(HrLoader::new(data)),
            Self::Marketing => Box::new(MarketingLoader::new(dataset_file(data, marketing::DATA_FILE))),
            Self::Procurement => {
                Box::new(ProcurementLoader::new(dataset_file(data, procurement::DATA_FILE)))
            }
            Self::ProcurementCsv => Box::new(ProcurementCsvLoader::new(data)),
        }
    }
}

fn dataset_file(data: &Path, file_name: &str) -> PathBuf {
    if data.is_dir() {
        data.join(file_name)
    } else {
        data.to_path_buf()
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Domain {
    type Err = HelixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hr" => Ok(Self::Hr),
            "marketing" => Ok(Self::Marketing),
            "procurement" => Ok(Self::Procurement),
            "procurement-csv" | "procurement_csv" => Ok(Self::ProcurementCsv),
            other => {
                let known: Vec<&str> = Self::ALL.iter().map(Domain::as_str).collect();
                Err(HelixError::config(format!(
                    "unknown domain '{other}', expected one of: {}",
                    known.join(", ")
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_parsing() {
        assert_eq!("HR".parse::<Domain>().unwrap(), Domain::Hr);
        assert_eq!("procurement".parse::<Domain>().unwrap(), Domain::Procurement);
        assert_eq!("procurement_csv".parse::<Domain>().unwrap(), Domain::ProcurementCsv);
        assert_eq!(Domain::ProcurementCsv.to_string(), "procurement-csv");
        let err = "finance".parse::<Domain>().unwrap_err();
        assert!(err
            .to_string()
            .contains("expected one of: hr, marketing, procurement, procurement-csv"));
    }

    #[test]
    fn test_loader_names_and_paths() {
        let data = Path::new("/nonexistent/data");
        assert_eq!(Domain::Marketing.default_data(data), data.join("marketing"));
        assert_eq!(Domain::Hr.loader(data).name(), "HRLoader");
        assert_eq!(Domain::Procurement.loader(data).name(), "ProcurementLoader");
        assert_eq!(Domain::ProcurementCsv.default_data(data), data.join("procurement_csv"));
        assert_eq!(Domain::ProcurementCsv.loader(data).name(), "ProcurementCSVLoader");
    }
}
