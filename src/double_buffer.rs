//! Shared-memory double buffer with a single atomic flag (§4.9, §6).
//!
//! Mirrors this codebase's existing `Ring`/`Snoop` split: construction
//! returns a disjoint `(Writer, Reader)` pair so the single-writer /
//! single-reader discipline required by §4.9/§5 is enforced by the type
//! system rather than by convention alone. The writer only ever touches the
//! block the flag does *not* point at; the reader only ever touches the
//! block the flag *does* point at, so the two never alias at the same time.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Fixed channel order, as specified in §3/§6. `COUNT` is used to size each
/// block: `COUNT * snapshot_points` `f32` values.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum Channel {
    Reference = 0,
    Modulating = 1,
    ModulatingPlusNoise = 2,
    SensorClean = 3,
    Noise = 4,
    Sensor = 5,
    AfterBpf = 6,
    MixerI = 7,
    MixerQ = 8,
    IOutput = 9,
    QOutput = 10,
    SignedOutput = 11,
    Time = 12,
}

impl Channel {
    pub const COUNT: usize = 13;
    pub const ALL: [Channel; Self::COUNT] = [
        Channel::Reference,
        Channel::Modulating,
        Channel::ModulatingPlusNoise,
        Channel::SensorClean,
        Channel::Noise,
        Channel::Sensor,
        Channel::AfterBpf,
        Channel::MixerI,
        Channel::MixerQ,
        Channel::IOutput,
        Channel::QOutput,
        Channel::SignedOutput,
        Channel::Time,
    ];
}

/// One block: 13 contiguous `f32` channel arrays, each `snapshot_points`
/// samples long (§3 "DoubleBuffer").
struct Block {
    data: Vec<f32>,
    snapshot_points: usize,
}

impl Block {
    fn new(snapshot_points: usize) -> Self {
        Self {
            data: vec![0.0; Channel::COUNT * snapshot_points],
            snapshot_points,
        }
    }

    fn channel_mut(&mut self, channel: Channel) -> &mut [f32] {
        let start = channel as usize * self.snapshot_points;
        &mut self.data[start..start + self.snapshot_points]
    }

    fn channel(&self, channel: Channel) -> &[f32] {
        let start = channel as usize * self.snapshot_points;
        &self.data[start..start + self.snapshot_points]
    }
}

struct Shared {
    flag: AtomicU32,
    blocks: [UnsafeCell<Block>; 2],
    snapshot_points: usize,
}

// SAFETY: `Writer` only dereferences `blocks[1 - flag]` and `Reader` only
// dereferences `blocks[flag]`. Since there is exactly one `Writer` and one
// `Reader` (produced together by `DoubleBuffer::new` and never cloned), and
// the flag only ever flips between those two states, the two mutable views
// are never live at the same time on the same block.
unsafe impl Sync for Shared {}

/// Exclusive write handle. Created alongside its matching `Reader`.
pub struct Writer {
    shared: Arc<Shared>,
}

/// Exclusive read handle. Created alongside its matching `Writer`.
pub struct Reader {
    shared: Arc<Shared>,
}

/// A write-side view into the currently-inactive block.
pub struct WriteGuard<'a> {
    block: &'a mut Block,
}

impl<'a> WriteGuard<'a> {
    pub fn channel_mut(&mut self, channel: Channel) -> &mut [f32] {
        self.block.channel_mut(channel)
    }
}

/// A read-side view into the currently-active block.
pub struct ReadGuard<'a> {
    block: &'a Block,
}

impl<'a> ReadGuard<'a> {
    pub fn channel(&self, channel: Channel) -> &[f32] {
        self.block.channel(channel)
    }
}

pub struct DoubleBuffer;

impl DoubleBuffer {
    /// Allocates a fresh double buffer sized for `snapshot_points` samples
    /// per channel and returns its writer/reader pair.
    pub fn new(snapshot_points: usize) -> (Writer, Reader) {
        let shared = Arc::new(Shared {
            flag: AtomicU32::new(0),
            blocks: [
                UnsafeCell::new(Block::new(snapshot_points)),
                UnsafeCell::new(Block::new(snapshot_points)),
            ],
            snapshot_points,
        });
        (
            Writer {
                shared: shared.clone(),
            },
            Reader { shared },
        )
    }
}

impl Writer {
    pub fn snapshot_points(&self) -> usize {
        self.shared.snapshot_points
    }

    /// Returns a view into the block the flag does *not* currently point at.
    pub fn acquire_write(&mut self) -> WriteGuard<'_> {
        let inactive = 1 - self.shared.flag.load(Ordering::Relaxed) as usize;
        // SAFETY: see `unsafe impl Sync for Shared`.
        let block = unsafe { &mut *self.shared.blocks[inactive].get() };
        WriteGuard { block }
    }

    /// Flips the flag with a release store once the inactive block has been
    /// fully written, so any reader that observes the new value with an
    /// acquire load is guaranteed to see the fully written block (§4.9, §5).
    pub fn publish(&mut self) {
        let current = self.shared.flag.load(Ordering::Relaxed);
        self.shared.flag.store(1 - current, Ordering::Release);
    }
}

impl Reader {
    pub fn snapshot_points(&self) -> usize {
        self.shared.snapshot_points
    }

    /// Returns a view into the block the flag currently points at.
    pub fn acquire_read(&self) -> ReadGuard<'_> {
        let active = self.shared.flag.load(Ordering::Acquire) as usize;
        // SAFETY: see `unsafe impl Sync for Shared`.
        let block = unsafe { &*self.shared.blocks[active].get() };
        ReadGuard { block }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_sees_newly_published_block() {
        let (mut writer, reader) = DoubleBuffer::new(4);
        {
            let mut w = writer.acquire_write();
            w.channel_mut(Channel::Reference).copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        }
        writer.publish();
        let r = reader.acquire_read();
        assert_eq!(r.channel(Channel::Reference), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn previously_active_block_is_untouched_by_next_write() {
        let (mut writer, reader) = DoubleBuffer::new(2);
        {
            let mut w = writer.acquire_write();
            w.channel_mut(Channel::Time).copy_from_slice(&[10.0, 20.0]);
        }
        writer.publish();
        let first_view: Vec<f32> = reader.acquire_read().channel(Channel::Time).to_vec();

        // Write a second snapshot into the now-inactive block; the reader's
        // already-captured view must be unaffected until it re-acquires.
        {
            let mut w = writer.acquire_write();
            w.channel_mut(Channel::Time).copy_from_slice(&[30.0, 40.0]);
        }
        assert_eq!(first_view, vec![10.0, 20.0]);
        writer.publish();
        assert_eq!(reader.acquire_read().channel(Channel::Time), &[30.0, 40.0]);
    }

    #[test]
    fn channel_order_matches_spec() {
        assert_eq!(Channel::ALL[0], Channel::Reference);
        assert_eq!(Channel::ALL[12], Channel::Time);
        assert_eq!(Channel::COUNT, 13);
    }
}
