// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page assembler — collects scan lines into an in-memory image and writes
// each finished page as PNG.
//
// Samples of any depth are expanded to 8 bits.  Single-channel passes of a
// three-pass colour scan are merged into one RGB page by their channel index.

use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use scanwerk_acquire::PageHandler;
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{FrameFormat, ScanLine, ScanPageInfo};
use tracing::{debug, error, info, warn};

/// Value of pixels no line has written to.
const BLANK: u8 = 0xff;

/// [`PageHandler`] that writes every finalised page to `out_dir` as
/// `<prefix>-<job>-<page>.png`.
pub struct PageAssembler {
    out_dir: PathBuf,
    prefix: String,
    job_label: String,
    page: Option<PageBuffer>,
    written: Vec<PathBuf>,
    error: Option<ScanwerkError>,
}

impl PageAssembler {
    /// Create an assembler writing into `out_dir`, creating it if needed.
    /// The job part of file names is the current local time.
    pub fn new(out_dir: impl Into<PathBuf>, prefix: &str) -> Result<Self> {
        let out_dir = out_dir.into();
        std::fs::create_dir_all(&out_dir)?;
        Ok(Self {
            out_dir,
            prefix: prefix.to_string(),
            job_label: chrono::Local::now().format("%Y%m%d-%H%M%S").to_string(),
            page: None,
            written: Vec::new(),
            error: None,
        })
    }

    pub fn with_job_label(mut self, label: impl Into<String>) -> Self {
        self.job_label = label.into();
        self
    }

    /// Files written so far, in page order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// First error hit while writing pages, if any.
    pub fn take_error(&mut self) -> Option<ScanwerkError> {
        self.error.take()
    }

    fn page_path(&self, number: usize) -> PathBuf {
        self.out_dir
            .join(format!("{}-{}-{}.png", self.prefix, self.job_label, number))
    }

    fn save(image: &DynamicImage, path: &Path) -> Result<()> {
        image
            .save_with_format(path, ImageFormat::Png)
            .map_err(|e| ScanwerkError::ImageError(format!("failed to write {}: {e}", path.display())))
    }
}

impl PageHandler for PageAssembler {
    fn setup_page(&mut self, info: &ScanPageInfo) {
        if self.page.is_some() {
            warn!("previous page was never finalised, discarding it");
        }
        debug!(width = info.width, height = ?info.height, channels = info.n_channels, "page setup");
        self.page = Some(PageBuffer::new(info));
    }

    fn handle_data(&mut self, line: &ScanLine) {
        match self.page.as_mut() {
            Some(page) => page.write_line(line),
            None => warn!(line = line.number, "line received outside a page"),
        }
    }

    fn finalize_page(&mut self) {
        let Some(page) = self.page.take() else {
            warn!("finalize without a page");
            return;
        };
        let path = self.page_path(self.written.len() + 1);
        let image = page.into_image();
        match Self::save(&image, &path) {
            Ok(()) => {
                info!(path = %path.display(), width = image.width(), height = image.height(), "page written");
                self.written.push(path);
            }
            Err(e) => {
                error!(error = %e, "page could not be written");
                self.error.get_or_insert(e);
            }
        }
    }
}

/// Pixels of the page under construction.
struct PageBuffer {
    width: u32,
    channels: u32,
    announced_rows: Option<u32>,
    allocated_rows: u32,
    rows_seen: u32,
    pixels: Vec<u8>,
}

impl PageBuffer {
    fn new(info: &ScanPageInfo) -> Self {
        let channels = if info.n_channels >= 3 { 3 } else { 1 };
        let rows = info.height.unwrap_or(0);
        let mut page = Self {
            width: info.width,
            channels,
            announced_rows: info.height,
            allocated_rows: 0,
            rows_seen: 0,
            pixels: Vec::new(),
        };
        page.ensure_rows(rows);
        page
    }

    fn row_bytes(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    /// Grow to hold at least `rows` rows.  Unknown-height pages double so
    /// long hand-held scans do not reallocate on every line.
    fn ensure_rows(&mut self, rows: u32) {
        if rows <= self.allocated_rows {
            return;
        }
        let target = if self.announced_rows.is_none() {
            rows.max(self.allocated_rows.saturating_mul(2))
        } else {
            rows
        };
        self.pixels.resize(target as usize * self.row_bytes(), BLANK);
        self.allocated_rows = target;
    }

    fn write_line(&mut self, line: &ScanLine) {
        let row = line.number;
        self.ensure_rows(row + 1);
        self.rows_seen = self.rows_seen.max(row + 1);

        let samples_per_pixel = line.format.samples_per_pixel() as usize;
        let row_start = row as usize * self.row_bytes();
        let channels = self.channels as usize;
        for x in 0..self.width.min(line.width) as usize {
            for s in 0..samples_per_pixel {
                let channel = match line.format {
                    FrameFormat::Rgb => s,
                    FrameFormat::Gray => 0,
                    FrameFormat::Red | FrameFormat::Green | FrameFormat::Blue => line.channel as usize,
                };
                if channel < channels {
                    let value = sample_to_u8(&line.data, line.depth, x * samples_per_pixel + s);
                    self.pixels[row_start + x * channels + channel] = value;
                }
            }
        }
    }

    fn into_image(mut self) -> DynamicImage {
        let rows = self.announced_rows.unwrap_or(0).max(self.rows_seen);
        self.pixels.truncate(rows as usize * self.row_bytes());
        let (width, channels) = (self.width, self.channels);
        let image = if channels == 3 {
            RgbImage::from_raw(width, rows, self.pixels).map(DynamicImage::ImageRgb8)
        } else {
            GrayImage::from_raw(width, rows, self.pixels).map(DynamicImage::ImageLuma8)
        };
        // The buffer is always sized to width * rows * channels.
        image.unwrap_or_else(|| DynamicImage::new_luma8(width, rows))
    }
}

/// Sample `index` of a packed row, scaled to 8 bits.
///
/// Sub-byte samples are packed most significant bit first; 16-bit samples
/// are in host byte order.
fn sample_to_u8(data: &[u8], depth: u32, index: usize) -> u8 {
    match depth {
        8 => data.get(index).copied().unwrap_or(0),
        16 => {
            let i = index * 2;
            match (data.get(i), data.get(i + 1)) {
                (Some(a), Some(b)) => (u16::from_ne_bytes([*a, *b]) >> 8) as u8,
                _ => 0,
            }
        }
        1 | 2 | 4 => {
            let depth = depth as usize;
            let bit = index * depth;
            let byte = data.get(bit / 8).copied().unwrap_or(0);
            let shift = 8 - depth - bit % 8;
            let max = (1u32 << depth) - 1;
            let value = u32::from(byte >> shift) & max;
            (value * 255 / max) as u8
        }
        _ => 0,
    }
}
