use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use log::{debug, info, warn};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::config::SearchConfig;
use crate::core::observer::SearchObserver;
use crate::core::sink::OutputSink;
use crate::crypto::crypto::{digest_hex, fill_payload};
use crate::error::{Result, SpoofError};
use crate::formats::container::Container;
use crate::utils::prefix::HexPrefix;
use crate::utils::verify::verify_render;

/// Lifecycle of one run. `Found` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    Searching,
    Found,
    Aborted,
}

impl SearchPhase {
    fn can_become(self, next: SearchPhase) -> bool {
        matches!(
            (self, next),
            (SearchPhase::Idle, SearchPhase::Searching)
                | (SearchPhase::Searching, SearchPhase::Found)
                | (SearchPhase::Searching, SearchPhase::Aborted)
        )
    }
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Total attempts across all workers when the match was seen.
    pub attempts: u64,
    pub digest: String,
    pub original_digest: String,
    pub candidate: Vec<u8>,
}

/// Lets another thread end a search early, e.g. to enforce a timeout. A stop
/// applies to the run in progress (or the next one, if none is running) and
/// is cleared when that run ends.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// State shared by the workers of one run. Nothing else is mutable.
struct SearchState {
    prefix: HexPrefix,
    original_digest: String,
    attempts: AtomicU64,
    found: AtomicBool,
    failed: AtomicBool,
    stop: StopHandle,
}

impl SearchState {
    fn should_stop(&self) -> bool {
        self.found.load(Ordering::Acquire)
            || self.failed.load(Ordering::Acquire)
            || self.stop.is_stopped()
    }
}

/// Brute-forces a file whose digest starts with a given prefix by inserting
/// random filler into the original container.
pub struct HashSpoofer {
    container: Container,
    config: SearchConfig,
    stop: StopHandle,
}

impl HashSpoofer {
    pub fn new(container: Container, config: SearchConfig) -> Self {
        Self {
            container,
            config,
            stop: StopHandle::new(),
        }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Runs until a match is found, an error occurs or the stop handle fires.
    /// Payloads come from the operating system's secure RNG.
    pub fn search(
        &self,
        prefix: &str,
        sink: &dyn OutputSink,
        observer: &dyn SearchObserver,
    ) -> Result<SearchOutcome> {
        self.search_with(prefix, sink, observer, |_| OsRng)
    }

    /// Same as [`HashSpoofer::search`] with a caller supplied RNG per worker.
    pub fn search_with<R, F>(
        &self,
        prefix: &str,
        sink: &dyn OutputSink,
        observer: &dyn SearchObserver,
        make_rng: F,
    ) -> Result<SearchOutcome>
    where
        R: RngCore,
        F: Fn(usize) -> R + Sync,
    {
        let prefix = HexPrefix::parse(prefix)?;
        self.config.validate(self.container.kind(), &prefix)?;
        if prefix.is_empty() {
            warn!("Empty prefix: the first candidate will match");
        }

        let original_digest = digest_hex(self.config.algorithm, self.container.bytes());
        observer.on_start(&original_digest, prefix.as_str());
        info!(
            "Searching {} {} for prefix {:?} with {} worker(s), ~{:.0} attempts expected",
            self.container.kind(),
            self.config.algorithm,
            prefix.as_str(),
            self.config.workers,
            prefix.expected_attempts()
        );
        debug!("Search configuration: {:?}", self.config);

        let state = SearchState {
            prefix,
            original_digest,
            attempts: AtomicU64::new(0),
            found: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            stop: self.stop.clone(),
        };

        let mut phase = SearchPhase::Idle;
        advance(&mut phase, SearchPhase::Searching, observer);
        let start = Instant::now();

        let results = if self.config.workers == 1 {
            vec![self.run_worker(0, &state, &make_rng, sink, observer)]
        } else {
            thread::scope(|scope| {
                let handles: Vec<_> = (0..self.config.workers)
                    .map(|id| {
                        let state = &state;
                        let make_rng = &make_rng;
                        scope.spawn(move || self.run_worker(id, state, make_rng, sink, observer))
                    })
                    .collect();

                handles
                    .into_iter()
                    .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                    .collect::<Vec<_>>()
            })
        };

        let attempts = state.attempts.load(Ordering::Acquire);
        self.stop.reset();
        let mut first_error = None;
        for result in results {
            match result {
                Ok(Some(outcome)) => {
                    advance(&mut phase, SearchPhase::Found, observer);
                    info!(
                        "Found matching digest after {} attempts in {:?} ms",
                        outcome.attempts,
                        start.elapsed().as_millis()
                    );
                    return Ok(outcome);
                }
                Ok(None) => {}
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        advance(&mut phase, SearchPhase::Aborted, observer);
        let err = first_error.unwrap_or(SpoofError::Cancelled { attempts });
        warn!("Search aborted after {} attempts: {}", attempts, err);
        Err(err)
    }

    fn run_worker<R, F>(
        &self,
        id: usize,
        state: &SearchState,
        make_rng: &F,
        sink: &dyn OutputSink,
        observer: &dyn SearchObserver,
    ) -> Result<Option<SearchOutcome>>
    where
        R: RngCore,
        F: Fn(usize) -> R,
    {
        let mut rng = make_rng(id);
        let result = self.attempt_loop(&mut rng, state, sink, observer);
        if result.is_err() {
            state.failed.store(true, Ordering::Release);
        }
        result
    }

    fn attempt_loop<R: RngCore>(
        &self,
        rng: &mut R,
        state: &SearchState,
        sink: &dyn OutputSink,
        observer: &dyn SearchObserver,
    ) -> Result<Option<SearchOutcome>> {
        let mut payload = vec![0u8; self.config.payload_size];
        let interval = self.config.progress_interval;

        loop {
            if state.should_stop() {
                return Ok(None);
            }

            fill_payload(rng, &mut payload)?;
            let candidate = self.container.candidate(&payload, self.config.chunk_tag)?;
            let digest = digest_hex(self.config.algorithm, &candidate);
            let attempts = state.attempts.fetch_add(1, Ordering::AcqRel) + 1;

            if state.prefix.matches(&digest) {
                // Only the first matching worker may write the output.
                if state
                    .found
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    return Ok(None);
                }

                if self.config.verify_render {
                    verify_render(self.container.kind(), self.container.bytes(), &candidate)?;
                }
                sink.persist(&candidate)?;

                let outcome = SearchOutcome {
                    attempts,
                    digest,
                    original_digest: state.original_digest.clone(),
                    candidate,
                };
                observer.on_found(&outcome);
                return Ok(Some(outcome));
            }

            if interval != 0 && attempts % interval == 0 {
                observer.on_progress(attempts, state.prefix.truncate(&digest));
            }
        }
    }
}

fn advance(phase: &mut SearchPhase, next: SearchPhase, observer: &dyn SearchObserver) {
    debug_assert!(phase.can_become(next), "illegal transition {:?} -> {:?}", phase, next);
    *phase = next;
    observer.on_phase(next);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::observer::{NullObserver, SearchEvent};
    use crate::core::sink::MemorySink;
    use crate::crypto::crypto::DigestAlgorithm;
    use crate::formats::container::ContainerKind;
    use crate::test_support::{minimal_jpeg, minimal_png};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::mpsc;

    fn png_spoofer(config: SearchConfig) -> HashSpoofer {
        HashSpoofer::new(Container::new(ContainerKind::Png, minimal_png()).unwrap(), config)
    }

    #[test]
    fn phase_transitions_are_restricted() {
        assert!(SearchPhase::Idle.can_become(SearchPhase::Searching));
        assert!(SearchPhase::Searching.can_become(SearchPhase::Found));
        assert!(SearchPhase::Searching.can_become(SearchPhase::Aborted));
        assert!(!SearchPhase::Idle.can_become(SearchPhase::Found));
        assert!(!SearchPhase::Found.can_become(SearchPhase::Searching));
        assert!(!SearchPhase::Aborted.can_become(SearchPhase::Searching));
    }

    #[test]
    fn finds_single_digit_prefix_and_writes_once() {
        let spoofer = png_spoofer(SearchConfig::default());
        let sink = MemorySink::new();

        let outcome = spoofer
            .search_with("0xA", &sink, &NullObserver, |_| StdRng::seed_from_u64(1))
            .unwrap();

        assert!(outcome.digest.starts_with('a'));
        assert!(outcome.attempts >= 1);
        assert_eq!(sink.writes(), vec![outcome.candidate.clone()]);
        assert_eq!(digest_hex(DigestAlgorithm::Sha256, &outcome.candidate), outcome.digest);
    }

    #[test]
    fn same_seed_gives_same_result() {
        let spoofer = png_spoofer(SearchConfig::default());
        let run = || {
            spoofer
                .search_with("00", &MemorySink::new(), &NullObserver, |_| StdRng::seed_from_u64(99))
                .unwrap()
        };
        let (a, b) = (run(), run());
        assert_eq!(a.attempts, b.attempts);
        assert_eq!(a.candidate, b.candidate);
    }

    #[test]
    fn reports_progress_on_interval_and_phases_in_order() {
        let config = SearchConfig { progress_interval: 5, ..Default::default() };
        let spoofer = png_spoofer(config);
        let (tx, rx) = mpsc::channel();

        let outcome = spoofer
            .search_with("000", &MemorySink::new(), &tx, |_| StdRng::seed_from_u64(3))
            .unwrap();
        drop(tx);
        let events: Vec<SearchEvent> = rx.iter().collect();

        assert!(matches!(events.first(), Some(SearchEvent::Started { .. })));
        assert_eq!(events[1], SearchEvent::Phase(SearchPhase::Searching));
        assert_eq!(events.last(), Some(&SearchEvent::Phase(SearchPhase::Found)));

        let progress: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                SearchEvent::Progress { attempts, digest_prefix } => {
                    assert_eq!(digest_prefix.len(), 3);
                    Some(*attempts)
                }
                _ => None,
            })
            .collect();
        assert!(progress.iter().all(|a| a % 5 == 0));
        assert_eq!(progress.len() as u64, (outcome.attempts - 1) / 5);
    }

    #[test]
    fn invalid_prefix_fails_before_searching() {
        let spoofer = png_spoofer(SearchConfig::default());
        let (tx, rx) = mpsc::channel();
        let err = spoofer.search("xyz", &MemorySink::new(), &tx).unwrap_err();
        drop(tx);

        assert!(matches!(err, SpoofError::InvalidPrefix(_)));
        assert_eq!(rx.iter().count(), 0);
    }

    #[test]
    fn oversized_jpeg_payload_fails_before_any_digest() {
        let config = SearchConfig { payload_size: 65534, ..Default::default() };
        let spoofer = HashSpoofer::new(Container::new(ContainerKind::Jpeg, minimal_jpeg()).unwrap(), config);
        let (tx, rx) = mpsc::channel();
        let sink = MemorySink::new();

        let err = spoofer.search("ff", &sink, &tx).unwrap_err();
        drop(tx);

        assert!(matches!(err, SpoofError::Format(_)));
        assert_eq!(rx.iter().count(), 0);
        assert!(sink.writes().is_empty());
    }

    #[test]
    fn stopped_handle_cancels_without_output() {
        let spoofer = png_spoofer(SearchConfig::default());
        spoofer.stop_handle().stop();
        let sink = MemorySink::new();

        let err = spoofer.search("0000000000", &sink, &NullObserver).unwrap_err();
        assert!(matches!(err, SpoofError::Cancelled { attempts: 0 }));
        assert!(sink.writes().is_empty());
    }

    #[test]
    fn stop_only_cancels_one_run() {
        let spoofer = png_spoofer(SearchConfig::default());
        spoofer.stop_handle().stop();

        let err = spoofer.search("00", &MemorySink::new(), &NullObserver).unwrap_err();
        assert!(matches!(err, SpoofError::Cancelled { attempts: 0 }));
        assert!(!spoofer.stop_handle().is_stopped());

        let outcome = spoofer
            .search_with("0", &MemorySink::new(), &NullObserver, |_| StdRng::seed_from_u64(4))
            .unwrap();
        assert!(outcome.digest.starts_with('0'));
    }

    #[test]
    fn empty_prefix_matches_first_candidate() {
        for raw in ["", "0x"] {
            let spoofer = png_spoofer(SearchConfig::default());
            let sink = MemorySink::new();

            let outcome = spoofer.search(raw, &sink, &NullObserver).unwrap();
            assert_eq!(outcome.attempts, 1);
            assert_eq!(sink.writes(), vec![outcome.candidate.clone()]);
            assert_eq!(
                spoofer.container().strip_candidate(&outcome.candidate, Default::default()).unwrap(),
                spoofer.container().bytes()
            );
        }
    }

    #[test]
    fn workers_share_one_counter_and_one_write() {
        let config = SearchConfig { workers: 4, ..Default::default() };
        let spoofer = png_spoofer(config);
        let sink = MemorySink::new();

        let outcome = spoofer
            .search_with("00", &sink, &NullObserver, |id| StdRng::seed_from_u64(id as u64))
            .unwrap();

        assert!(outcome.digest.starts_with("00"));
        assert_eq!(sink.writes().len(), 1);
        assert_eq!(sink.writes()[0], outcome.candidate);
    }
}
