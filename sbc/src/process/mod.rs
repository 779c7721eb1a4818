/// Syncword search over the loaded stream.
///
/// Provides [`find_next_sync`](scan::find_next_sync) and the
/// [`SyncScanner`](scan::SyncScanner) iterator.
pub mod scan;

/// Picking the next frame start after a decode failure.
///
/// Provides [`ResyncStrategy`](resync::ResyncStrategy) and the frame
/// [`Fingerprint`](resync::Fingerprint) it matches against.
pub mod resync;

/// Frame decoding to PCM samples.
///
/// Provides the [`FrameCodec`](decode::FrameCodec) contract and the built-in
/// [`SbcDecoder`](decode::SbcDecoder).
pub mod decode;

/// PCM output.
///
/// Provides the [`AudioSink`](sink::AudioSink) device contract and the
/// [`ScopedSink`](sink::ScopedSink) lifecycle wrapper.
pub mod sink;

/// The decode loop.
///
/// Provides [`StreamDecoder`](stream::StreamDecoder), which ties scanning,
/// decoding, resynchronisation and output together.
pub mod stream;

/// Two mono frames: 44.1 kHz, 4 blocks, 4 subbands, loudness, bitpool 2.
pub const EXAMPLE_DATA: &[u8] = &[
    0x9C, 0x80, 0x02, 0x5A, 0x21, 0x43, 0x7E, //
    0x9C, 0x80, 0x02, 0x5A, 0x87, 0x65, 0x18,
];
