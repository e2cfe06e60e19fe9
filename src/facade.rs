//! Lifecycle, control messages, and output packaging (§4.13, §6).
//!
//! Control and event channels are `thingbuf::mpsc::blocking` channels, the
//! same MPSC primitive this codebase already uses for setting updates and
//! snooped buffers. The producer runs on its own `std::thread`; `Init`
//! happens synchronously in [`EngineFacade::init`] since the shared buffer
//! here is an in-process `DoubleBuffer`, not a region handed across an FFI
//! or socket boundary — there is no serialized message to replay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thingbuf::mpsc::blocking::{channel, Receiver, Sender};

use crate::chain_runner::{ChainRunner, FrameReady};
use crate::config::{EngineParams, ParamsDiff};
use crate::double_buffer::{DoubleBuffer, Reader, Writer};
use crate::error::EngineError;

const CONTROL_CHANNEL_CAPACITY: usize = 64;
const EVENT_CHANNEL_CAPACITY: usize = 64;
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Messages accepted by the producer thread. `Shutdown` is not part of the
/// documented external interface (§6 lists `Init`/`Start`/`Stop`/
/// `UpdateParams`) — it exists only so `EngineFacade::drop` can end the
/// background thread deterministically.
#[derive(Clone, Debug, Default)]
pub enum ControlMessage {
    Start { params: EngineParams },
    #[default]
    Stop,
    UpdateParams { diff: ParamsDiff },
    Shutdown,
}

/// Messages emitted by the producer thread (§6 event channel).
#[derive(Clone, Copy, Debug, Default)]
pub enum EventMessage {
    #[default]
    Idle,
    FrameReady(FrameReady),
}

/// Handle held by the consumer side: sends control messages in, receives
/// events out. Construction (`init`) is the only synchronous step; `Start`,
/// `Stop`, and `UpdateParams` are fire-and-forget messages consumed by the
/// producer thread.
pub struct EngineFacade {
    control_tx: Sender<ControlMessage>,
    event_rx: Receiver<EventMessage>,
    is_running: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl EngineFacade {
    /// Allocates the shared double buffer for `snapshot_points` samples per
    /// channel and spawns the producer thread. Returns the facade handle
    /// plus the consumer's `Reader` (§4.13 `Init`).
    pub fn init(snapshot_points: usize) -> Result<(EngineFacade, Reader), EngineError> {
        if snapshot_points == 0 {
            return Err(EngineError::ShapeMismatch {
                actual: 0,
                required: 1,
            });
        }

        let (writer, reader) = DoubleBuffer::new(snapshot_points);
        let (control_tx, control_rx) = channel(CONTROL_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = channel(EVENT_CHANNEL_CAPACITY);
        let is_running = Arc::new(AtomicBool::new(false));

        let running_flag = is_running.clone();
        let join_handle = thread::Builder::new()
            .name("lockin-engine-producer".into())
            .spawn(move || producer_loop(writer, control_rx, event_tx, running_flag))
            .expect("failed to spawn producer thread");

        Ok((
            EngineFacade {
                control_tx,
                event_rx,
                is_running,
                join_handle: Some(join_handle),
            },
            reader,
        ))
    }

    /// Sends `Start(params)`. Parameters are clamped and validated by the
    /// producer thread; design failures there are logged, not returned here
    /// (the control channel is fire-and-forget, matching §6).
    pub fn start(&self, mut params: EngineParams) {
        params.clamp();
        let _ = self.control_tx.send(ControlMessage::Start { params });
    }

    pub fn stop(&self) {
        let _ = self.control_tx.send(ControlMessage::Stop);
    }

    pub fn update_params(&self, diff: ParamsDiff) {
        let _ = self.control_tx.send(ControlMessage::UpdateParams { diff });
    }

    /// True once a `Start` has been accepted and the producer has not since
    /// processed a `Stop`.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// Non-blocking poll of the event channel.
    pub fn try_recv_event(&self) -> Option<EventMessage> {
        self.event_rx.try_recv().ok()
    }

    /// Blocks until the next event arrives or the producer thread exits.
    pub fn recv_event(&self) -> Option<EventMessage> {
        self.event_rx.recv()
    }
}

impl Drop for EngineFacade {
    fn drop(&mut self) {
        let _ = self.control_tx.send(ControlMessage::Shutdown);
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

fn producer_loop(
    mut writer: Writer,
    control_rx: Receiver<ControlMessage>,
    event_tx: Sender<EventMessage>,
    is_running: Arc<AtomicBool>,
) {
    let mut runner: Option<ChainRunner> = None;

    loop {
        while let Ok(msg) = control_rx.try_recv() {
            match msg {
                ControlMessage::Start { params } => match ChainRunner::new(params) {
                    Ok(r) => {
                        runner = Some(r);
                        is_running.store(true, Ordering::Release);
                        log::info!("engine started");
                    }
                    Err(err) => log::warn!("rejected Start: {err}"),
                },
                ControlMessage::Stop => {
                    // §3 "destroyed by Stop" / §5 "DSP component ownership is
                    // released": drop the runner entirely rather than just
                    // resetting it, so a later `UpdateParams` with no
                    // intervening `Start` is rejected as `NotInitialized`
                    // instead of silently mutating a "destroyed" engine.
                    runner = None;
                    is_running.store(false, Ordering::Release);
                    log::info!("engine stopped");
                }
                ControlMessage::UpdateParams { diff } => match runner.as_mut() {
                    Some(r) => {
                        if let Err(err) = r.update_params(&diff) {
                            log::warn!("rejected UpdateParams: {err}");
                        }
                    }
                    None => log::warn!("{}", EngineError::NotInitialized),
                },
                ControlMessage::Shutdown => return,
            }
        }

        if is_running.load(Ordering::Acquire) {
            if let Some(r) = runner.as_mut() {
                let now = Instant::now();
                r.process_due(now);
                if let Some(frame) = r.maybe_publish(now, &mut writer) {
                    let _ = event_tx.send(EventMessage::FrameReady(frame));
                }
            }
        }

        thread::sleep(IDLE_POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn init_rejects_zero_snapshot_points() {
        init_logging();
        assert!(matches!(
            EngineFacade::init(0),
            Err(EngineError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn init_succeeds_and_is_not_running_until_start() {
        init_logging();
        let (facade, _reader) = EngineFacade::init(256).unwrap();
        assert!(!facade.is_running());
    }

    #[test]
    fn start_eventually_flips_is_running() {
        init_logging();
        let (facade, _reader) = EngineFacade::init(64).unwrap();
        facade.start(EngineParams::default());
        let mut seen_running = false;
        for _ in 0..200 {
            if facade.is_running() {
                seen_running = true;
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert!(seen_running);
        facade.stop();
    }

    #[test]
    fn update_params_after_stop_does_not_resurrect_runner() {
        // §3 "destroyed by Stop" / §5 "DSP component ownership is released":
        // once Stop has been processed, an UpdateParams with no intervening
        // Start must be rejected (logged as NotInitialized), not applied to
        // a lingering runner.
        init_logging();
        let (facade, _reader) = EngineFacade::init(64).unwrap();
        facade.start(EngineParams::default());
        let mut seen_running = false;
        for _ in 0..200 {
            if facade.is_running() {
                seen_running = true;
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert!(seen_running);

        facade.stop();
        for _ in 0..200 {
            if !facade.is_running() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!facade.is_running());

        facade.update_params(ParamsDiff {
            reference_frequency: Some(250.0),
            ..Default::default()
        });
        thread::sleep(Duration::from_millis(20));
        // The diff had nowhere to land; the engine must stay stopped rather
        // than silently starting back up or crashing the producer thread.
        assert!(!facade.is_running());
    }
}
