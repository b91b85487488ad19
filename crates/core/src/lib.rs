pub mod bridge;
pub mod cancel;
pub mod config;
pub mod container;
pub mod error;
pub mod extractor;
pub mod framer;
pub mod load;
pub mod media;
pub mod upstream;

pub use bridge::{
    FramePublisher, NativeFrameBridge, NativeSession, SessionHandle, SharedFrameSession,
};
pub use cancel::CancellationToken;
pub use config::IngestConfig;
pub use error::{IngestError, Result};
pub use extractor::{ContainerExtractor, Extractor, ExtractorRegistry};
pub use framer::FrameFramer;
pub use load::{LoadSummary, Loader};
pub use upstream::{DataSource, DataSourceRegistry, DataSpec};
