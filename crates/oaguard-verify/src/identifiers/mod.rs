pub mod arxiv;
pub mod doi;
pub mod extract;

pub use arxiv::ArxivId;
pub use doi::Doi;
pub use extract::{PageSignals, extract_doi, extract_doi_from_pdf_url};
