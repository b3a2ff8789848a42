use {
    crate::{
        metrics::Metrics,
        registry::Registry,
        signing::{self, ThresholdSignature},
        transport::{Endpoint, Request, Response, Transport, TransportError},
    },
    futures::{StreamExt, future::join_all, stream::FuturesUnordered},
    phantom_crypto::{
        Ciphertext, Point, Scalar,
        elgamal::{self, PartialDecryption},
        shamir,
    },
    rand::Rng,
    std::{sync::Arc, time::Duration},
};

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Partial decryptions required for reconstruction.
    pub threshold: usize,
    /// Exceeding this marks the executor `Degraded`, but its response is
    /// still awaited.
    pub soft_timeout: Duration,
    /// Exceeding this abandons the request.
    pub hard_timeout: Duration,
    /// Full signing attempts before giving up on a round.
    pub sign_attempts: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            soft_timeout: Duration::from_secs(10),
            hard_timeout: Duration::from_secs(20),
            sign_attempts: 3,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("quorum of {required} executors not reached")]
    QuorumNotReached { required: usize },
    #[error("executor {index} exceeded the hard deadline")]
    ExecutorTimeout { index: u32 },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Crypto(#[from] elgamal::Error),
    #[error(transparent)]
    Sharing(#[from] shamir::Error),
    #[error("combined threshold signature failed verification")]
    SignatureInvalid,
}

impl Error {
    /// Transient failures abort the round but leave the system healthy;
    /// everything else indicates an invariant breach.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::QuorumNotReached { .. } | Self::ExecutorTimeout { .. } | Self::Transport(_)
        )
    }
}

/// A reconstructed plaintext together with the verified partials it came
/// from, which callers expose as the round's decryption transcript.
#[derive(Debug, Clone)]
pub struct Decryption {
    pub value: u64,
    pub transcript: Vec<PartialDecryption>,
}

#[derive(Debug, Clone)]
struct Candidate {
    index: u32,
    endpoint: Endpoint,
    public_share: Point,
}

/// Drives threshold operations against the executor registry: fan a request
/// out to the quorum candidates, verify every response proof before it
/// counts, and reconstruct once enough valid responses arrived.
pub struct Coordinator {
    registry: Arc<Registry>,
    transport: Arc<dyn Transport>,
    group_key: Point,
    config: CoordinatorConfig,
    metrics: &'static Metrics,
}

impl Coordinator {
    pub fn new(
        registry: Arc<Registry>,
        transport: Arc<dyn Transport>,
        group_key: Point,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            registry,
            transport,
            group_key,
            config,
            metrics: Metrics::get(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn group_key(&self) -> Point {
        self.group_key
    }

    /// Threshold-decrypts one ciphertext: first `threshold` proof-valid
    /// partials reconstruct the plaintext.
    pub async fn decrypt(&self, ciphertext: Ciphertext, bound: u64) -> Result<Decryption, Error> {
        let partials = self
            .collect_first(
                Request::PartialDecrypt { c1: ciphertext.c1 },
                |candidate, response| {
                    let Response::PartialDecrypt(partial) = response else {
                        return None;
                    };
                    if partial.index != candidate.index {
                        return None;
                    }
                    elgamal::verify_partial(candidate.public_share, ciphertext.c1, &partial)
                        .ok()?;
                    Some(partial)
                },
            )
            .await?;
        let shares: Vec<(u32, Point)> = partials
            .iter()
            .map(|partial| (partial.index, partial.share))
            .collect();
        let value = elgamal::reconstruct(ciphertext, &shares, bound)?;
        self.metrics
            .operations
            .with_label_values(&["decrypt"])
            .inc();
        Ok(Decryption {
            value,
            transcript: partials,
        })
    }

    /// Decrypts a batch of ciphertexts in one round trip per executor. Each
    /// response carries a single proof covering all requested items.
    pub async fn batch_decrypt(
        &self,
        ciphertexts: &[Ciphertext],
        bound: u64,
    ) -> Result<Vec<u64>, Error> {
        if ciphertexts.is_empty() {
            return Ok(Vec::new());
        }
        let c1s: Vec<Point> = ciphertexts.iter().map(|ciphertext| ciphertext.c1).collect();
        let request = Request::BatchPartialDecrypt { c1s: c1s.clone() };
        let batches = self
            .collect_first(request, |candidate, response| {
                let Response::BatchPartialDecrypt(batch) = response else {
                    return None;
                };
                if batch.index != candidate.index {
                    return None;
                }
                elgamal::verify_partial_batch(candidate.public_share, &c1s, &batch).ok()?;
                Some(batch)
            })
            .await?;
        let values = ciphertexts
            .iter()
            .enumerate()
            .map(|(position, &ciphertext)| {
                let shares: Vec<(u32, Point)> = batches
                    .iter()
                    .map(|batch| (batch.index, batch.shares[position]))
                    .collect();
                elgamal::reconstruct(ciphertext, &shares, bound)
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.metrics
            .operations
            .with_label_values(&["batch_decrypt"])
            .inc();
        Ok(values)
    }

    /// Produces a threshold Schnorr signature over `message`. Two rounds:
    /// nonce commitments from the first `threshold` responders, then their
    /// responses to the aggregated challenge. A participant dropping out
    /// between rounds fails the attempt, so the whole exchange retries a
    /// bounded number of times.
    pub async fn sign(&self, message: [u8; 32]) -> Result<ThresholdSignature, Error> {
        let mut last_error = Error::QuorumNotReached {
            required: self.config.threshold,
        };
        for attempt in 0..self.config.sign_attempts {
            match self.sign_once(message).await {
                Ok(signature) => {
                    self.metrics.operations.with_label_values(&["sign"]).inc();
                    return Ok(signature);
                }
                Err(error) if error.is_transient() => {
                    tracing::warn!(attempt, ?error, "signing attempt failed");
                    last_error = error;
                }
                Err(error) => return Err(error),
            }
        }
        Err(last_error)
    }

    async fn sign_once(&self, message: [u8; 32]) -> Result<ThresholdSignature, Error> {
        let session: u64 = rand::thread_rng().r#gen();
        let commitments = self
            .collect_first(
                Request::NonceCommit { session, message },
                |candidate, response| {
                    let Response::NonceCommit { index, commitment } = response else {
                        return None;
                    };
                    (index == candidate.index).then_some((candidate.clone(), commitment))
                },
            )
            .await?;

        let indexes: Vec<u32> = commitments
            .iter()
            .map(|(candidate, _)| candidate.index)
            .collect();
        let mut combined_nonce = Point::Infinity;
        let mut lambdas = Vec::with_capacity(commitments.len());
        for (candidate, commitment) in &commitments {
            let lambda = shamir::lagrange_zero(&indexes, candidate.index)?;
            combined_nonce = combined_nonce.add(commitment.mul_vartime(lambda));
            lambdas.push(lambda);
        }
        let challenge = signing::challenge(combined_nonce, self.group_key, &message);

        // Round two goes to exactly the committed participants; every one
        // of them must answer with a share that verifies against its nonce
        // commitment.
        let responses = join_all(commitments.iter().map(|(candidate, _)| {
            let request = Request::PartialSign {
                session,
                message,
                challenge,
            };
            async move {
                self.request_with_deadlines(candidate.index, &candidate.endpoint, request)
                    .await
            }
        }))
        .await;

        let mut signature = Scalar::ZERO;
        for (((candidate, commitment), lambda), response) in
            commitments.iter().zip(&lambdas).zip(responses)
        {
            let share = match response {
                Ok(Response::PartialSign { index, share }) if index == candidate.index => share,
                Ok(_) | Err(_) => {
                    self.registry.record_failure(candidate.index);
                    return Err(Error::QuorumNotReached {
                        required: self.config.threshold,
                    });
                }
            };
            if !signing::verify_partial(share, *commitment, challenge, candidate.public_share) {
                tracing::warn!(index = candidate.index, "invalid partial signature");
                self.registry.record_failure(candidate.index);
                return Err(Error::QuorumNotReached {
                    required: self.config.threshold,
                });
            }
            self.registry.record_success(candidate.index);
            signature = signature + *lambda * share;
        }

        let signature = ThresholdSignature {
            r: combined_nonce,
            s: signature,
        };
        if !signing::verify(&signature, self.group_key, &message) {
            return Err(Error::SignatureInvalid);
        }
        Ok(signature)
    }

    /// Fans `request` out to every quorum candidate and returns the first
    /// `threshold` responses that `accept` validates. Invalid responses and
    /// failures degrade the executor and the collection continues with the
    /// remaining candidates.
    async fn collect_first<T>(
        &self,
        request: Request,
        mut accept: impl FnMut(&Candidate, Response) -> Option<T>,
    ) -> Result<Vec<T>, Error> {
        let required = self.config.threshold;
        let candidates: Vec<Candidate> = self
            .registry
            .quorum_candidates()
            .into_iter()
            .map(|(index, endpoint, public_share)| Candidate {
                index,
                endpoint,
                public_share,
            })
            .collect();
        if candidates.len() < required {
            return Err(Error::QuorumNotReached { required });
        }

        let mut in_flight: FuturesUnordered<_> = candidates
            .into_iter()
            .map(|candidate| {
                let request = request.clone();
                async move {
                    let result = self
                        .request_with_deadlines(candidate.index, &candidate.endpoint, request)
                        .await;
                    (candidate, result)
                }
            })
            .collect();

        let mut accepted = Vec::with_capacity(required);
        while let Some((candidate, result)) = in_flight.next().await {
            match result {
                Ok(response) => match accept(&candidate, response) {
                    Some(item) => {
                        self.registry.record_success(candidate.index);
                        accepted.push(item);
                        if accepted.len() == required {
                            return Ok(accepted);
                        }
                    }
                    None => {
                        tracing::warn!(
                            index = candidate.index,
                            "dropping response with invalid proof"
                        );
                        self.registry.record_failure(candidate.index);
                    }
                },
                Err(error) => {
                    tracing::warn!(index = candidate.index, ?error, "executor request failed");
                    self.registry.record_failure(candidate.index);
                }
            }
        }
        Err(Error::QuorumNotReached { required })
    }

    /// One request with the two-stage deadline: past the soft timeout the
    /// executor is degraded but the response is still awaited until the
    /// hard timeout.
    async fn request_with_deadlines(
        &self,
        index: u32,
        endpoint: &Endpoint,
        request: Request,
    ) -> Result<Response, Error> {
        let send = self.transport.send(endpoint, request);
        tokio::pin!(send);
        match tokio::time::timeout(self.config.soft_timeout, &mut send).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                tracing::warn!(index, "executor exceeded the soft deadline");
                self.registry.mark_degraded(index);
                let remaining = self
                    .config
                    .hard_timeout
                    .saturating_sub(self.config.soft_timeout);
                match tokio::time::timeout(remaining, &mut send).await {
                    Ok(result) => Ok(result?),
                    Err(_) => Err(Error::ExecutorTimeout { index }),
                }
            }
        }
    }

    /// Probes impaired executors on a fixed cadence; a successful heartbeat
    /// brings an executor back online.
    pub fn spawn_heartbeats(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                for (index, endpoint) in coordinator.registry.impaired() {
                    let probe = coordinator
                        .transport
                        .send(&endpoint, Request::Heartbeat);
                    match tokio::time::timeout(coordinator.config.hard_timeout, probe).await {
                        Ok(Ok(Response::Heartbeat { index: reported })) if reported == index => {
                            tracing::info!(index, "executor rejoined");
                            coordinator.registry.mark_online(index);
                        }
                        _ => tracing::debug!(index, "heartbeat probe failed"),
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            executor::{LocalExecutor, LocalTransport},
            registry::ExecutorDescriptor,
        },
        model::{health::ExecutorStatus, time::SystemClock},
        rand::rngs::OsRng,
    };

    const BOUND: u64 = 1 << 16;

    struct Network {
        coordinator: Arc<Coordinator>,
        transport: Arc<LocalTransport>,
        group_key: Point,
    }

    fn network(config: CoordinatorConfig) -> Network {
        let mut rng = OsRng;
        let key = elgamal::threshold_keygen(3, 5, &mut rng).unwrap();
        let executors: Vec<Arc<LocalExecutor>> = key
            .shares
            .iter()
            .map(|share| Arc::new(LocalExecutor::new(*share)))
            .collect();
        let descriptors = executors
            .iter()
            .map(|executor| {
                ExecutorDescriptor::new(
                    executor.index(),
                    executor.public_share(),
                    LocalTransport::endpoint_of(executor.index()),
                )
            })
            .collect();
        let transport = Arc::new(LocalTransport::new(executors));
        let registry = Arc::new(Registry::new(descriptors, Arc::new(SystemClock::default())));
        Network {
            coordinator: Arc::new(Coordinator::new(
                registry,
                Arc::clone(&transport) as Arc<dyn Transport>,
                key.public,
                config,
            )),
            transport,
            group_key: key.public,
        }
    }

    fn fast_config() -> CoordinatorConfig {
        CoordinatorConfig {
            soft_timeout: Duration::from_millis(100),
            hard_timeout: Duration::from_millis(200),
            ..Default::default()
        }
    }

    fn encrypt(network: &Network, value: u64) -> Ciphertext {
        elgamal::encrypt(network.group_key, value, BOUND, &mut OsRng).unwrap()
    }

    #[tokio::test]
    async fn decrypts_with_all_executors_online() {
        let network = network(fast_config());
        let ciphertext = encrypt(&network, 1234);
        let decryption = network.coordinator.decrypt(ciphertext, BOUND).await.unwrap();
        assert_eq!(decryption.value, 1234);
        assert_eq!(decryption.transcript.len(), 3);
    }

    #[tokio::test]
    async fn decrypts_with_two_executors_offline() {
        let network = network(fast_config());
        network.transport.set_offline(2, true);
        network.transport.set_offline(4, true);
        let ciphertext = encrypt(&network, 999);
        let decryption = network.coordinator.decrypt(ciphertext, BOUND).await.unwrap();
        assert_eq!(decryption.value, 999);
    }

    #[tokio::test]
    async fn fails_with_three_executors_offline_then_recovers() {
        let network = network(fast_config());
        for index in [1, 2, 3] {
            network.transport.set_offline(index, true);
        }
        let ciphertext = encrypt(&network, 5);
        let error = network
            .coordinator
            .decrypt(ciphertext, BOUND)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::QuorumNotReached { required: 3 }));
        assert!(error.is_transient());

        // One executor comes back and the next attempt succeeds.
        network.transport.set_offline(1, false);
        let decryption = network.coordinator.decrypt(ciphertext, BOUND).await.unwrap();
        assert_eq!(decryption.value, 5);
    }

    #[tokio::test]
    async fn stalled_executor_is_degraded_but_quorum_survives() {
        let network = network(fast_config());
        network.transport.set_stalled(1, true);
        let ciphertext = encrypt(&network, 42);
        let decryption = network.coordinator.decrypt(ciphertext, BOUND).await.unwrap();
        assert_eq!(decryption.value, 42);
        let health = network.coordinator.registry().health();
        assert_eq!(health[0].status, ExecutorStatus::Degraded);
    }

    #[tokio::test]
    async fn batch_decrypt_recovers_all_values() {
        let network = network(fast_config());
        let values = [7u64, 0, 30000];
        let ciphertexts: Vec<Ciphertext> =
            values.iter().map(|&value| encrypt(&network, value)).collect();
        let decrypted = network
            .coordinator
            .batch_decrypt(&ciphertexts, BOUND)
            .await
            .unwrap();
        assert_eq!(decrypted, values);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let network = network(fast_config());
        assert!(network
            .coordinator
            .batch_decrypt(&[], BOUND)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn signs_with_quorum_and_survives_offline_executors() {
        let network = network(fast_config());
        network.transport.set_offline(5, true);
        let message = [3u8; 32];
        let signature = network.coordinator.sign(message).await.unwrap();
        assert!(signing::verify(&signature, network.group_key, &message));
    }

    #[tokio::test]
    async fn heartbeat_restores_an_offline_executor() {
        let network = network(fast_config());
        network.transport.set_offline(1, true);
        // Three failed interactions take the executor offline.
        for _ in 0..3 {
            let ciphertext = encrypt(&network, 1);
            let _ = network.coordinator.decrypt(ciphertext, BOUND).await;
        }
        assert_eq!(
            network.coordinator.registry().health()[0].status,
            ExecutorStatus::Offline
        );

        network.transport.set_offline(1, false);
        let handle = network
            .coordinator
            .spawn_heartbeats(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();
        assert_eq!(
            network.coordinator.registry().health()[0].status,
            ExecutorStatus::Online
        );
    }
}
