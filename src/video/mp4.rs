//! MPEG-4 output through FFmpeg.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling;
use ffmpeg::{codec, encoder, format, frame, Packet, Rational};
use image::imageops::{self, FilterType};
use image::RgbImage;

use super::{FrameSink, RECORDING_FPS};

const BIT_RATE: usize = 4_000_000;

/// Writes frames to an `.mp4` file. The encoder is opened with the size of
/// the first frame; later frames of another size are scaled to it.
pub struct Mp4Sink {
    path: PathBuf,
    encoder: Option<Encoder>,
}

struct Encoder {
    output: format::context::Output,
    video: encoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
    stream_time_base: Rational,
    width: u32,
    height: u32,
    next_pts: i64,
}

impl Mp4Sink {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            encoder: None,
        }
    }
}

impl Encoder {
    fn open(path: &Path, width: u32, height: u32) -> Result<Self> {
        ffmpeg::init()?;
        // yuv420p needs even dimensions.
        let width = (width & !1).max(2);
        let height = (height & !1).max(2);

        let mut output = format::output(&path)?;
        let codec = encoder::find(codec::Id::MPEG4).ok_or_else(|| anyhow!("MPEG-4 encoder not available"))?;
        let global_header = output.format().flags().contains(format::Flags::GLOBAL_HEADER);

        let mut video = codec::context::Context::new_with_codec(codec).encoder().video()?;
        video.set_width(width);
        video.set_height(height);
        video.set_format(Pixel::YUV420P);
        video.set_time_base(Rational(1, RECORDING_FPS as i32));
        video.set_frame_rate(Some(Rational(RECORDING_FPS as i32, 1)));
        video.set_bit_rate(BIT_RATE);
        if global_header {
            video.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        let video = video.open_as(codec)?;

        let stream_index = {
            let mut stream = output.add_stream(codec)?;
            stream.set_parameters(&video);
            stream.index()
        };
        output.write_header()?;
        let stream_time_base = output
            .stream(stream_index)
            .map(|s| s.time_base())
            .ok_or_else(|| anyhow!("Output stream vanished"))?;

        let scaler = scaling::Context::get(
            Pixel::RGB24,
            width,
            height,
            Pixel::YUV420P,
            width,
            height,
            scaling::Flags::BILINEAR,
        )?;

        log::info!("Opened {} ({}x{} @ {} fps)", path.display(), width, height, RECORDING_FPS);
        Ok(Self {
            output,
            video,
            scaler,
            stream_index,
            stream_time_base,
            width,
            height,
            next_pts: 0,
        })
    }

    fn encode(&mut self, image: &RgbImage) -> Result<()> {
        let resized;
        let image = if image.dimensions() == (self.width, self.height) {
            image
        } else {
            resized = imageops::resize(image, self.width, self.height, FilterType::Triangle);
            &resized
        };

        let mut rgb = frame::Video::new(Pixel::RGB24, self.width, self.height);
        let stride = rgb.stride(0);
        let row_len = self.width as usize * 3;
        let data = rgb.data_mut(0);
        for (y, row) in image.as_raw().chunks_exact(row_len).enumerate() {
            data[y * stride..y * stride + row_len].copy_from_slice(row);
        }

        let mut yuv = frame::Video::empty();
        self.scaler.run(&rgb, &mut yuv)?;
        yuv.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.video.send_frame(&yuv)?;
        self.drain()
    }

    fn drain(&mut self) -> Result<()> {
        let mut packet = Packet::empty();
        while self.video.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(Rational(1, RECORDING_FPS as i32), self.stream_time_base);
            packet.write_interleaved(&mut self.output)?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        self.video.send_eof()?;
        self.drain()?;
        self.output.write_trailer()?;
        Ok(())
    }
}

impl FrameSink for Mp4Sink {
    fn write(&mut self, frame: &RgbImage) -> Result<()> {
        if self.encoder.is_none() {
            self.encoder = Some(Encoder::open(&self.path, frame.width(), frame.height())?);
        }
        match self.encoder.as_mut() {
            Some(encoder) => encoder.encode(frame),
            None => Ok(()),
        }
    }

    fn finish(self: Box<Self>) -> Result<()> {
        match self.encoder {
            Some(encoder) => encoder.finish(),
            None => {
                log::info!("No frames recorded, {} not written", self.path.display());
                Ok(())
            }
        }
    }
}
