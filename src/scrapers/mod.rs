pub mod booli;
pub mod browser;
pub mod fetch;
pub mod idealista;
pub mod registry;
pub mod subito;
pub mod traits;
pub mod types;

pub use booli::BooliAdapter;
pub use browser::BrowserFetcher;
pub use fetch::{HttpFetcher, OxylabsFetcher};
pub use idealista::IdealistaAdapter;
pub use registry::AdapterRegistry;
pub use subito::SubitoAdapter;
pub use traits::{PageFetcher, SiteAdapter};
pub use types::{parse_amount, SearchCriteria};
