/// FFmpeg帧过滤器模块
/// FFmpeg frame filter module
use super::stream::FrameSender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame};
use image::GrayImage;
use std::time::Instant;

/// FFmpeg帧过滤器: 摄像头 → 灰度帧 (管线前端已接 format=gray)
pub struct LumaFilter {
    sender: FrameSender,
    pub count: usize,
    pub last: Instant,
    pub current_fps: f64,
    pub dropped_frames: usize, // 丢弃的帧数
    pub total_frames: usize,   // 总帧数
}

impl LumaFilter {
    pub fn new(sender: FrameSender) -> Self {
        Self {
            sender,
            count: 0,
            last: Instant::now(),
            current_fps: 0.0,
            dropped_frames: 0,
            total_frames: 0,
        }
    }
}

impl FrameFilter for LumaFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        tracing::debug!("摄像头帧过滤器启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<Frame>, String> {
        self.total_frames += 1;

        unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.dropped_frames += 1;
                self.sender.send_frame_error("empty or corrupt frame");
                return Ok(None);
            }

            let w = (*frame.as_ptr()).width as u32;
            let h = (*frame.as_ptr()).height as u32;
            let plane = (*frame.as_ptr()).data[0];
            let stride = (*frame.as_ptr()).linesize[0] as usize;

            if w == 0 || h == 0 || plane.is_null() || stride < w as usize {
                self.dropped_frames += 1;
                self.sender
                    .send_frame_error(format!("invalid frame {}x{} stride={}", w, h, stride));
                return Ok(None);
            }

            // 逐行拷贝亮度平面 (去掉行尾padding)
            let width = w as usize;
            let mut luma = Vec::with_capacity(width * h as usize);
            for row in 0..h as usize {
                let line = std::slice::from_raw_parts(plane.add(row * stride), width);
                luma.extend_from_slice(line);
            }

            let Some(image) = GrayImage::from_raw(w, h, luma) else {
                self.dropped_frames += 1;
                return Ok(None);
            };

            self.count += 1;
            if self.last.elapsed().as_secs_f64() >= 1.0 {
                let elapsed = self.last.elapsed().as_secs_f64();
                self.current_fps = self.count as f64 / elapsed;
                tracing::trace!(
                    fps = self.current_fps,
                    total = self.total_frames,
                    dropped = self.dropped_frames,
                    "采集统计"
                );
                self.last = Instant::now();
                self.count = 0;
            }

            if !self.sender.send_frame(image) {
                return Err("frame receiver gone".to_string());
            }
        }

        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        tracing::debug!(
            total = self.total_frames,
            dropped = self.dropped_frames + self.sender.dropped_frames as usize,
            "摄像头帧过滤器退出"
        );
    }
}
