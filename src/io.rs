use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder, ImageError, Rgba, RgbaImage};

use crate::error::LoadError;

/// Largest edge the placeholder route will synthesize.
pub const MAX_PLACEHOLDER_EDGE: u32 = 8192;

const PLACEHOLDER_FILL: Rgba<u8> = Rgba([0xe5, 0xe7, 0xeb, 0xff]);
const PLACEHOLDER_BORDER: Rgba<u8> = Rgba([0xd1, 0xd5, 0xdb, 0xff]);

// ============================================================================
// URL RESOLUTION
// ============================================================================

/// Where an image URL points.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageSource {
    /// `/api/placeholder/{w}/{h}`, synthesized locally.
    Placeholder { width: u32, height: u32 },
    /// `http://` or `https://`.
    Remote(String),
    /// Anything else, resolved against the asset root.
    Local(PathBuf),
}

/// Classify `url`. Root-relative paths (`/dd.png`) live under `asset_root`.
pub fn resolve(url: &str, asset_root: &Path) -> Result<ImageSource, LoadError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(LoadError::InvalidUrl(url.to_string()));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(ImageSource::Remote(url.to_string()));
    }
    if let Some(path) = url.strip_prefix("file://") {
        return Ok(ImageSource::Local(PathBuf::from(path)));
    }

    let relative = url.trim_start_matches('/');
    let mut parts = relative.split('/');
    if let (Some("api"), Some("placeholder"), Some(w), Some(h), None) =
        (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
    {
        let parse = |s: &str| s.parse::<u32>().map_err(|_| LoadError::InvalidUrl(url.to_string()));
        return Ok(ImageSource::Placeholder {
            width: parse(w)?,
            height: parse(h)?,
        });
    }

    Ok(ImageSource::Local(asset_root.join(relative)))
}

/// Flat gray image with a one-pixel border, standing in for generated output.
pub fn placeholder_image(width: u32, height: u32) -> Result<RgbaImage, LoadError> {
    if width == 0 || height == 0 || width > MAX_PLACEHOLDER_EDGE || height > MAX_PLACEHOLDER_EDGE {
        return Err(LoadError::InvalidSize(width, height));
    }
    Ok(RgbaImage::from_fn(width, height, |x, y| {
        if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
            PLACEHOLDER_BORDER
        } else {
            PLACEHOLDER_FILL
        }
    }))
}

/// Decode an image file from disk into RGBA.
pub fn load_image_sync(path: &Path) -> Result<RgbaImage, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.display().to_string()));
    }
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

// ============================================================================
// FETCHERS
// ============================================================================

/// Turns an image URL into pixels. Runs on a worker thread.
pub trait ImageFetch: Send + Sync {
    fn fetch(&self, url: &str) -> Result<RgbaImage, LoadError>;
}

impl<F> ImageFetch for F
where
    F: Fn(&str) -> Result<RgbaImage, LoadError> + Send + Sync,
{
    fn fetch(&self, url: &str) -> Result<RgbaImage, LoadError> {
        self(url)
    }
}

/// The real fetcher: local assets, the placeholder route, and http(s).
pub struct UrlFetcher {
    asset_root: PathBuf,
    http_timeout: Duration,
}

impl UrlFetcher {
    pub fn new(asset_root: impl Into<PathBuf>, http_timeout: Duration) -> Self {
        Self {
            asset_root: asset_root.into(),
            http_timeout,
        }
    }

    fn fetch_remote(&self, url: &str) -> Result<RgbaImage, LoadError> {
        log::debug!("fetching {}", url);
        let client = reqwest::blocking::Client::builder()
            .timeout(self.http_timeout)
            .build()?;
        let response = client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes()?;
        Ok(image::load_from_memory(&bytes)?.to_rgba8())
    }
}

impl ImageFetch for UrlFetcher {
    fn fetch(&self, url: &str) -> Result<RgbaImage, LoadError> {
        match resolve(url, &self.asset_root)? {
            ImageSource::Placeholder { width, height } => placeholder_image(width, height),
            ImageSource::Remote(url) => self.fetch_remote(&url),
            ImageSource::Local(path) => load_image_sync(&path),
        }
    }
}

// ============================================================================
// ASYNC LOADER
// ============================================================================

/// What a finished load produced.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(Arc<RgbaImage>),
    Failed(LoadError),
}

struct Delivery {
    token: u64,
    url: String,
    result: Result<Arc<RgbaImage>, LoadError>,
}

struct InFlight {
    /// Token reported to the caller.
    token: u64,
    /// Token the worker will deliver with.
    fetch: u64,
    url: String,
    started: Instant,
}

/// Background image loads with stale-result suppression.
///
/// Every request gets a fresh token. Only the newest request's result is ever
/// reported; earlier ones are dropped on receipt. The last decoded image is
/// kept so repeated renders of the same URL skip the fetch.
pub struct ImageLoader {
    fetcher: Arc<dyn ImageFetch>,
    sender: mpsc::Sender<Delivery>,
    receiver: mpsc::Receiver<Delivery>,
    next_token: u64,
    in_flight: Option<InFlight>,
    timeout: Duration,
    cache: Option<(String, Arc<RgbaImage>)>,
}

impl ImageLoader {
    pub fn new(fetcher: Arc<dyn ImageFetch>, timeout: Duration) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            fetcher,
            sender,
            receiver,
            next_token: 1,
            in_flight: None,
            timeout,
            cache: None,
        }
    }

    /// Start loading `url`, superseding any load still in flight. A request
    /// for the URL already being fetched joins that fetch instead of
    /// starting another.
    pub fn request(&mut self, url: &str, now: Instant) -> u64 {
        let token = self.next_token;
        self.next_token += 1;

        if let Some((cached_url, image)) = &self.cache
            && cached_url == url
        {
            self.in_flight = Some(InFlight {
                token,
                fetch: token,
                url: url.to_string(),
                started: now,
            });
            // Receiver lives in self, so the send cannot fail.
            let _ = self.sender.send(Delivery {
                token,
                url: url.to_string(),
                result: Ok(Arc::clone(image)),
            });
            return token;
        }

        if let Some(f) = &mut self.in_flight
            && f.url == url
        {
            log::trace!("joining load of {} (token {} -> {})", url, f.token, token);
            f.token = token;
            return token;
        }

        self.in_flight = Some(InFlight {
            token,
            fetch: token,
            url: url.to_string(),
            started: now,
        });
        let fetcher = Arc::clone(&self.fetcher);
        let sender = self.sender.clone();
        let url = url.to_string();
        rayon::spawn(move || {
            let result = fetcher.fetch(&url).map(Arc::new);
            let _ = sender.send(Delivery { token, url, result });
        });
        token
    }

    /// Drain finished loads. Returns the newest request's outcome once, or a
    /// timeout failure if it has been outstanding for too long.
    pub fn poll(&mut self, now: Instant) -> Option<LoadOutcome> {
        let mut outcome = None;
        while let Ok(delivery) = self.receiver.try_recv() {
            let current = matches!(&self.in_flight, Some(f) if f.fetch == delivery.token);
            if !current {
                log::debug!("discarding stale load of {} (token {})", delivery.url, delivery.token);
                continue;
            }
            self.in_flight = None;
            outcome = Some(match delivery.result {
                Ok(image) => {
                    self.cache = Some((delivery.url, Arc::clone(&image)));
                    LoadOutcome::Loaded(image)
                }
                Err(e) => LoadOutcome::Failed(e),
            });
        }

        if outcome.is_none()
            && let Some(f) = &self.in_flight
            && now.saturating_duration_since(f.started) >= self.timeout
        {
            log::warn!("load of {} timed out", f.url);
            self.in_flight = None;
            outcome = Some(LoadOutcome::Failed(LoadError::TimedOut(self.timeout.as_millis())));
        }
        outcome
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.is_some()
    }
}

// ============================================================================
// ENCODING
// ============================================================================

/// Output formats of the headless washer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SaveFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
    Bmp,
}

impl SaveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
            SaveFormat::Webp => "webp",
            SaveFormat::Bmp => "bmp",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            "webp" => Some(SaveFormat::Webp),
            "bmp" => Some(SaveFormat::Bmp),
            _ => None,
        }
    }
}

/// Encode and write an image to a file.
pub fn encode_and_write(
    image: &RgbaImage,
    path: &Path,
    format: SaveFormat,
    quality: u8,
) -> Result<(), ImageError> {
    match format {
        SaveFormat::Png => {
            let mut writer = BufWriter::new(File::create(path)?);
            PngEncoder::new(&mut writer).write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Jpeg => {
            let mut writer = BufWriter::new(File::create(path)?);
            let rgb_image = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100)).write_image(
                rgb_image.as_raw(),
                rgb_image.width(),
                rgb_image.height(),
                image::ColorType::Rgb8,
            )?;
        }
        SaveFormat::Webp => {
            DynamicImage::ImageRgba8(image.clone())
                .save_with_format(path, image::ImageFormat::WebP)?;
        }
        SaveFormat::Bmp => {
            let mut writer = BufWriter::new(File::create(path)?);
            BmpEncoder::new(&mut writer).write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait(loader: &mut ImageLoader) -> Option<LoadOutcome> {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Some(outcome) = loader.poll(Instant::now()) {
                return Some(outcome);
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        None
    }

    #[test]
    fn resolves_each_kind() {
        let root = Path::new("/srv/assets");
        assert_eq!(
            resolve("/api/placeholder/512/256", root).unwrap(),
            ImageSource::Placeholder { width: 512, height: 256 }
        );
        assert_eq!(
            resolve("https://example.com/a.png", root).unwrap(),
            ImageSource::Remote("https://example.com/a.png".into())
        );
        assert_eq!(
            resolve("/dd.png", root).unwrap(),
            ImageSource::Local(PathBuf::from("/srv/assets/dd.png"))
        );
        assert_eq!(
            resolve("img/b.jpg", root).unwrap(),
            ImageSource::Local(PathBuf::from("/srv/assets/img/b.jpg"))
        );
        assert_eq!(
            resolve("file:///tmp/c.png", root).unwrap(),
            ImageSource::Local(PathBuf::from("/tmp/c.png"))
        );
        assert!(matches!(resolve("  ", root), Err(LoadError::InvalidUrl(_))));
        assert!(matches!(resolve("/api/placeholder/x/2", root), Err(LoadError::InvalidUrl(_))));
    }

    #[test]
    fn placeholder_has_requested_size() {
        let img = placeholder_image(4, 3).unwrap();
        assert_eq!(img.dimensions(), (4, 3));
        assert_eq!(*img.get_pixel(1, 1), PLACEHOLDER_FILL);
        assert_eq!(*img.get_pixel(0, 0), PLACEHOLDER_BORDER);
        assert!(placeholder_image(0, 3).is_err());
        assert!(placeholder_image(MAX_PLACEHOLDER_EDGE + 1, 3).is_err());
    }

    #[test]
    fn missing_local_file_is_not_found() {
        let fetcher = UrlFetcher::new("/definitely/not/here", Duration::from_secs(1));
        assert!(matches!(fetcher.fetch("/nope.png"), Err(LoadError::NotFound(_))));
    }

    #[test]
    fn encode_then_load_png() {
        let dir = std::env::temp_dir().join(format!("huewash-io-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("out.png");
        let img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]));
        encode_and_write(&img, &path, SaveFormat::Png, 90).unwrap();
        assert_eq!(load_image_sync(&path).unwrap(), img);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn loader_delivers_latest_only() {
        let fetcher = |url: &str| -> Result<RgbaImage, LoadError> {
            if url == "slow" {
                std::thread::sleep(Duration::from_millis(50));
            }
            Ok(RgbaImage::from_pixel(1, 1, Rgba([url.len() as u8, 0, 0, 255])))
        };
        let mut loader = ImageLoader::new(Arc::new(fetcher), Duration::from_secs(5));
        loader.request("slow", Instant::now());
        loader.request("fast!", Instant::now());

        match wait(&mut loader) {
            Some(LoadOutcome::Loaded(img)) => assert_eq!(img.get_pixel(0, 0)[0], 5),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!loader.is_pending());

        // The slow result eventually arrives and is dropped.
        std::thread::sleep(Duration::from_millis(100));
        assert!(loader.poll(Instant::now()).is_none());
    }

    #[test]
    fn loader_reports_failures() {
        let fetcher = |url: &str| -> Result<RgbaImage, LoadError> { Err(LoadError::NotFound(url.into())) };
        let mut loader = ImageLoader::new(Arc::new(fetcher), Duration::from_secs(5));
        loader.request("gone.png", Instant::now());
        assert!(matches!(wait(&mut loader), Some(LoadOutcome::Failed(LoadError::NotFound(_)))));
    }

    #[test]
    fn loader_times_out() {
        let fetcher = |_: &str| -> Result<RgbaImage, LoadError> {
            std::thread::sleep(Duration::from_millis(200));
            Ok(RgbaImage::new(1, 1))
        };
        let mut loader = ImageLoader::new(Arc::new(fetcher), Duration::from_millis(10));
        let start = Instant::now();
        loader.request("hang", start);
        assert!(loader.poll(start).is_none());
        assert!(matches!(
            loader.poll(start + Duration::from_millis(10)),
            Some(LoadOutcome::Failed(LoadError::TimedOut(10)))
        ));
        assert!(!loader.is_pending());
    }

    #[test]
    fn repeated_url_hits_cache() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let fetcher = move |_: &str| -> Result<RgbaImage, LoadError> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(RgbaImage::new(2, 2))
        };
        let mut loader = ImageLoader::new(Arc::new(fetcher), Duration::from_secs(5));
        loader.request("a.png", Instant::now());
        assert!(matches!(wait(&mut loader), Some(LoadOutcome::Loaded(_))));
        loader.request("a.png", Instant::now());
        assert!(matches!(loader.poll(Instant::now()), Some(LoadOutcome::Loaded(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn same_url_joins_the_running_fetch() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let fetcher = move |_: &str| -> Result<RgbaImage, LoadError> {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(40));
            Ok(RgbaImage::new(2, 2))
        };
        let mut loader = ImageLoader::new(Arc::new(fetcher), Duration::from_secs(5));
        let first = loader.request("a.png", Instant::now());
        let second = loader.request("a.png", Instant::now());
        assert!(second > first);
        assert!(matches!(wait(&mut loader), Some(LoadOutcome::Loaded(_))));
        assert!(!loader.is_pending());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
