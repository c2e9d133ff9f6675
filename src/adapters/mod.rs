// Adapters - External system implementations

pub mod exec_ffmpeg;
pub mod fs_local;
pub mod probe_ffprobe;
pub mod timestamps;

// Re-export adapters
pub use exec_ffmpeg::{FfmpegExecutor, RecordingExecutor};
pub use fs_local::LocalFs;
pub use probe_ffprobe::FfprobeProber;
pub use timestamps::FileTimestamps;
