use {
    crate::{
        signing,
        transport::{Endpoint, Request, Response, Transport, TransportError},
    },
    phantom_crypto::{Point, elgamal, shamir::Share},
    std::{
        collections::{HashMap, HashSet},
        sync::{Arc, RwLock},
        time::Duration,
    },
};

/// An executor living in this process. Holds its key share and answers the
/// coordinator's requests; tests and the demo binary run five of these
/// behind a [`LocalTransport`].
pub struct LocalExecutor {
    share: Share,
}

impl LocalExecutor {
    pub fn new(share: Share) -> Self {
        Self { share }
    }

    pub fn index(&self) -> u32 {
        self.share.index
    }

    pub fn public_share(&self) -> Point {
        Point::generator().mul(self.share.value)
    }

    pub fn handle(&self, request: Request) -> Response {
        match request {
            Request::PartialDecrypt { c1 } => {
                Response::PartialDecrypt(elgamal::partial_decrypt(&self.share, c1))
            }
            Request::BatchPartialDecrypt { c1s } => {
                Response::BatchPartialDecrypt(elgamal::partial_decrypt_batch(&self.share, &c1s))
            }
            Request::NonceCommit { session, message } => Response::NonceCommit {
                index: self.share.index,
                commitment: Point::generator()
                    .mul(signing::nonce(&self.share, session, &message)),
            },
            Request::PartialSign {
                session,
                message,
                challenge,
            } => Response::PartialSign {
                index: self.share.index,
                share: signing::nonce(&self.share, session, &message)
                    + challenge * self.share.value,
            },
            Request::Heartbeat => Response::Heartbeat {
                index: self.share.index,
            },
        }
    }
}

/// In-process transport over a set of [`LocalExecutor`]s with fault
/// injection: executors can be taken offline (requests fail immediately) or
/// stalled (requests hang until the coordinator's deadline fires).
pub struct LocalTransport {
    executors: HashMap<Endpoint, Arc<LocalExecutor>>,
    offline: RwLock<HashSet<u32>>,
    stalled: RwLock<HashSet<u32>>,
}

impl LocalTransport {
    pub fn new(executors: impl IntoIterator<Item = Arc<LocalExecutor>>) -> Self {
        Self {
            executors: executors
                .into_iter()
                .map(|executor| (Self::endpoint_of(executor.index()), executor))
                .collect(),
            offline: Default::default(),
            stalled: Default::default(),
        }
    }

    pub fn endpoint_of(index: u32) -> Endpoint {
        Endpoint(format!("local://executor/{index}"))
    }

    pub fn set_offline(&self, index: u32, offline: bool) {
        let mut set = self.offline.write().unwrap();
        if offline {
            set.insert(index);
        } else {
            set.remove(&index);
        }
    }

    pub fn set_stalled(&self, index: u32, stalled: bool) {
        let mut set = self.stalled.write().unwrap();
        if stalled {
            set.insert(index);
        } else {
            set.remove(&index);
        }
    }
}

#[async_trait::async_trait]
impl Transport for LocalTransport {
    async fn send(
        &self,
        endpoint: &Endpoint,
        request: Request,
    ) -> Result<Response, TransportError> {
        let executor = self
            .executors
            .get(endpoint)
            .ok_or_else(|| TransportError(format!("unknown endpoint {}", endpoint.0)))?;
        if self.offline.read().unwrap().contains(&executor.index()) {
            return Err(TransportError("connection refused".to_string()));
        }
        if self.stalled.read().unwrap().contains(&executor.index()) {
            // Longer than any coordinator deadline; the caller's timeout
            // resolves first.
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(executor.handle(request))
    }
}
