pub mod feed;
pub mod synthetic;
pub mod types;

use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use types::RawTransaction;

/// A producer of raw transactions.
///
/// Consuming the source yields a lazy stream that runs until `shutdown` is
/// cancelled or the upstream closes. A source cannot be restarted.
pub trait IngestionSource: Send {
    /// Short label used in logs.
    fn name(&self) -> &str;

    fn into_stream(self: Box<Self>, shutdown: CancellationToken) -> BoxStream<'static, RawTransaction>;
}
