//! Camera capture module
//!
//! Captures webcam frames with nokhwa on a background thread and exposes the
//! latest one to the render and classifier threads. `DesktopArSession`
//! wraps the capture as the app's world-tracking frame source.

pub mod session;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::{Buffer, Camera};
use parking_lot::Mutex;

pub use session::DesktopArSession;

/// Camera frame data
#[derive(Clone)]
pub struct CameraFrame {
    /// RGBA pixel data
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Frame number
    pub frame_number: u64,
    /// Frame timestamp
    pub timestamp: Instant,
}

impl CameraFrame {
    /// True when the pixel buffer holds width * height RGBA pixels
    pub fn is_complete(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == (self.width as usize) * (self.height as usize) * 4
    }
}

impl std::fmt::Debug for CameraFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("frame_number", &self.frame_number)
            .finish_non_exhaustive()
    }
}

type FrameSlot = Arc<Mutex<Option<Arc<CameraFrame>>>>;

/// Wait after a frame could not be captured or decoded
const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Convert a raw camera buffer to RGBA pixels: (width, height, data)
fn decode_frame(buffer: &Buffer) -> Result<(u32, u32, Vec<u8>), String> {
    buffer
        .decode_image::<RgbAFormat>()
        .map(|image| (image.width(), image.height(), image.into_raw()))
        .map_err(|e| format!("Failed to decode frame: {:?}", e))
}

/// Camera capture interface
pub struct CameraCapture {
    /// Latest captured frames, triple buffered
    frames: [FrameSlot; 3],
    /// Index of the latest complete frame
    latest_frame_idx: Arc<AtomicU64>,
    /// Whether capture is running
    running: Arc<AtomicBool>,
    /// Capture thread handle
    thread_handle: Option<std::thread::JoinHandle<()>>,
    /// Frame counter
    frame_count: Arc<AtomicU64>,
}

impl CameraCapture {
    /// Start capturing from a camera
    ///
    /// # Arguments
    /// * `camera_index` - The camera index to use (0 for default)
    /// * `width` - Requested frame width
    /// * `height` - Requested frame height
    pub fn new(camera_index: u32, width: u32, height: u32) -> Result<Self, String> {
        let frames: [FrameSlot; 3] = [
            Arc::new(Mutex::new(None)),
            Arc::new(Mutex::new(None)),
            Arc::new(Mutex::new(None)),
        ];
        let latest_frame_idx = Arc::new(AtomicU64::new(0));
        let running = Arc::new(AtomicBool::new(true));
        let frame_count = Arc::new(AtomicU64::new(0));

        let frames_clone = frames.clone();
        let latest_frame_idx_clone = latest_frame_idx.clone();
        let running_clone = running.clone();
        let frame_count_clone = frame_count.clone();

        let thread_handle = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || {
                Self::capture_thread(
                    camera_index,
                    Resolution::new(width, height),
                    frames_clone,
                    latest_frame_idx_clone,
                    running_clone,
                    frame_count_clone,
                );
            })
            .map_err(|e| format!("Failed to spawn capture thread: {}", e))?;

        Ok(Self {
            frames,
            latest_frame_idx,
            running,
            thread_handle: Some(thread_handle),
            frame_count,
        })
    }

    /// Open the camera, trying progressively looser format requests
    fn open_camera(camera_index: u32, resolution: Resolution) -> Option<Camera> {
        let index = CameraIndex::Index(camera_index);
        let attempts = [
            RequestedFormatType::HighestResolution(resolution),
            RequestedFormatType::AbsoluteHighestResolution,
            RequestedFormatType::None,
        ];

        for request in attempts {
            match Camera::new(index.clone(), RequestedFormat::new::<RgbAFormat>(request)) {
                Ok(camera) => return Some(camera),
                Err(e) => log::warn!("Failed to open camera {} with {:?}: {:?}", camera_index, request, e),
            }
        }
        None
    }

    /// Camera capture thread
    fn capture_thread(
        camera_index: u32,
        resolution: Resolution,
        frames: [FrameSlot; 3],
        latest_frame_idx: Arc<AtomicU64>,
        running: Arc<AtomicBool>,
        frame_count: Arc<AtomicU64>,
    ) {
        log::info!("Starting camera capture thread (camera {})", camera_index);

        let Some(mut camera) = Self::open_camera(camera_index, resolution) else {
            log::error!("Failed to open camera {} with all format attempts", camera_index);
            running.store(false, Ordering::Release);
            return;
        };

        if let Err(e) = camera.open_stream() {
            log::error!("Failed to open camera stream: {:?}", e);
            running.store(false, Ordering::Release);
            return;
        }

        log::info!(
            "Camera opened: {} ({}x{})",
            camera.info().human_name(),
            camera.resolution().width(),
            camera.resolution().height()
        );

        let mut write_idx: u64 = 0;

        while running.load(Ordering::Acquire) {
            let decoded = camera
                .frame()
                .map_err(|e| format!("Failed to capture frame: {:?}", e))
                .and_then(|buffer| decode_frame(&buffer));

            let (width, height, data) = match decoded {
                Ok(decoded) => decoded,
                Err(e) => {
                    log::warn!("{}", e);
                    std::thread::sleep(CAPTURE_RETRY_DELAY);
                    continue;
                }
            };

            let frame_number = frame_count.fetch_add(1, Ordering::Relaxed) + 1;
            let camera_frame = Arc::new(CameraFrame {
                width,
                height,
                data,
                frame_number,
                timestamp: Instant::now(),
            });

            let slot = (write_idx % 3) as usize;
            *frames[slot].lock() = Some(camera_frame);
            latest_frame_idx.store(write_idx, Ordering::Release);
            write_idx = write_idx.wrapping_add(1);
        }

        if let Err(e) = camera.stop_stream() {
            log::warn!("Failed to stop camera stream: {:?}", e);
        }
        log::info!("Camera capture thread stopped");
    }

    /// Get the latest captured frame
    pub fn latest_frame(&self) -> Option<Arc<CameraFrame>> {
        let idx = self.latest_frame_idx.load(Ordering::Acquire);
        let slot = (idx % 3) as usize;
        self.frames[slot].lock().clone()
    }

    /// Check if capture is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Get frame count
    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Relaxed)
    }

    /// Stop capturing
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32, len: usize) -> CameraFrame {
        CameraFrame {
            data: vec![0; len],
            width,
            height,
            frame_number: 1,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn test_complete_frame() {
        assert!(frame(4, 2, 32).is_complete());
    }

    #[test]
    fn test_truncated_frame_incomplete() {
        assert!(!frame(4, 2, 31).is_complete());
        assert!(!frame(0, 0, 0).is_complete());
    }

    // A YUYV stream must hold whole 4-byte pixel pairs
    #[test]
    fn test_undecodable_buffer_is_an_error() {
        let buffer = Buffer::new(
            Resolution::new(4, 4),
            &[0x10, 0x80, 0x10],
            nokhwa::utils::FrameFormat::YUYV,
        );
        let result = decode_frame(&buffer);
        assert!(result.unwrap_err().starts_with("Failed to decode frame"));
    }
}
