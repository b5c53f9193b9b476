//! Single GET against Consul with the failure policy applied

use bytes::Bytes;
use hiera_consul_client::{ConsulTransport, FailurePolicy};
use tracing::{debug, warn};

use crate::error::{BackendError, Result};

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct QueryOptions {
    pub recurse: bool,
    pub ignore_404: bool,
}

/// GET `path` and return the body of a 2xx answer.
///
/// `Ok(None)` covers non-2xx statuses and, under the graceful policy,
/// transport failures. Strict-mode transport failures are returned as errors.
pub(crate) async fn query(
    transport: &dyn ConsulTransport,
    path: &str,
    options: QueryOptions,
) -> Result<Option<Bytes>> {
    let response = match transport.get(path, options.recurse).await {
        Ok(response) => response,
        Err(e) => match transport.failure_policy() {
            FailurePolicy::Graceful => {
                warn!("Request to {} failed, skipping: {}", path, e);
                return Ok(None);
            }
            FailurePolicy::Strict => {
                return Err(BackendError::Transport {
                    path: path.to_string(),
                    source: e,
                });
            }
        },
    };

    if !response.is_success() {
        if response.status == 404 && options.ignore_404 {
            debug!("{} not found, skipping", path);
        } else {
            warn!("Bad HTTP response for {}: status {}", path, response.status);
        }
        return Ok(None);
    }

    Ok(Some(response.body))
}
