use tracing::debug;

use crate::codec::{ImageCodec, JpegCodec};
use crate::error::MediaResult;

/// Longest allowed edge after downscaling.
pub const MAX_DIMENSION: u32 = 2048;

const QUALITY_FLOOR: f32 = 0.1;
const QUALITY_CEIL: f32 = 1.0;
const MAX_ITERATIONS: u32 = 8;
const RELATIVE_TOLERANCE: f64 = 0.10;

/// Byte budget chosen from the source size: big originals get a bigger
/// budget so they keep more detail through the downscale.
#[derive(Clone, Copy, Debug)]
pub struct TargetPolicy {
    /// Sources larger than this get the large budget.
    pub large_source_threshold: u64,
    pub large_target: u64,
    pub small_target: u64,
}

impl Default for TargetPolicy {
    fn default() -> Self {
        Self {
            large_source_threshold: 1024 * 1024,
            large_target: 200 * 1024,
            small_target: 100 * 1024,
        }
    }
}

impl TargetPolicy {
    /// The byte budget for a source of the given size.
    pub fn target_for(&self, source_len: u64) -> u64 {
        if source_len > self.large_source_threshold {
            self.large_target
        } else {
            self.small_target
        }
    }
}

/// Cap the longer edge at `min(2048, max(width, height))`, scaling both
/// dimensions by the same ratio and rounding to the nearest pixel.
pub fn fit_dimensions(width: u32, height: u32) -> (u32, u32) {
    let longest = width.max(height);
    let cap = MAX_DIMENSION.min(longest);
    if width <= cap && height <= cap {
        return (width, height);
    }
    let ratio = f64::from(cap) / f64::from(longest);
    let fit = |edge: u32| (f64::from(edge) * ratio).round().max(1.0) as u32;
    (fit(width), fit(height))
}

/// A compression result: the chosen encoding and how it was found.
#[derive(Clone, Debug)]
pub struct Compressed {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Quality of the winning candidate, in `[0.1, 1.0]`.
    pub quality: f32,
    /// Encode passes spent by the search.
    pub iterations: u32,
    /// Format tag of the payload.
    pub format: String,
}

/// Binary-search compressor targeting a byte budget.
///
/// At most [`MAX_ITERATIONS`] encode passes; the candidate whose exact
/// encoded size lies closest to the target wins, even when a later pass
/// lands further away. The search stops early once the relative error
/// drops under 10%.
pub struct Compressor<C: ImageCodec = JpegCodec> {
    codec: C,
}

impl Compressor<JpegCodec> {
    /// A compressor over the production JPEG codec.
    pub fn new() -> Self {
        Self { codec: JpegCodec }
    }
}

impl Default for Compressor<JpegCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ImageCodec> Compressor<C> {
    /// A compressor over a custom codec.
    pub fn with_codec(codec: C) -> Self {
        Self { codec }
    }

    /// Re-encode `bytes` toward `target_bytes`.
    ///
    /// Never fails for a decodable input; a decode failure propagates.
    pub fn compress(&self, bytes: &[u8], target_bytes: u64) -> MediaResult<Compressed> {
        let target = target_bytes.max(1);

        let decoded = self.codec.decode(bytes)?;
        let (width, height) = self.codec.dimensions(&decoded);
        let (fit_w, fit_h) = fit_dimensions(width, height);
        let image = if (fit_w, fit_h) != (width, height) {
            self.codec.resize(&decoded, fit_w, fit_h)
        } else {
            decoded
        };

        let mut floor = QUALITY_FLOOR;
        let mut ceil = QUALITY_CEIL;
        let mut best: Option<(Vec<u8>, f32, u64)> = None;
        let mut iterations = 0;

        while iterations < MAX_ITERATIONS {
            let quality = (floor + ceil) / 2.0;
            let encoded = self.codec.encode(&image, quality)?;
            let size = encoded.len() as u64;
            iterations += 1;

            let distance = size.abs_diff(target);
            if best
                .as_ref()
                .map_or(true, |(_, _, best_distance)| distance < *best_distance)
            {
                best = Some((encoded, quality, distance));
            }

            if size > target {
                ceil = quality;
            } else {
                floor = quality;
            }

            if (distance as f64) / (target as f64) < RELATIVE_TOLERANCE {
                break;
            }
        }

        // The loop always runs at least once, so a candidate exists.
        let (bytes, quality, distance) = best.expect("search ran zero iterations");
        debug!(
            target,
            size = bytes.len(),
            distance,
            quality,
            iterations,
            "compression finished"
        );

        Ok(Compressed {
            bytes,
            width: fit_w,
            height: fit_h,
            quality,
            iterations,
            format: "jpeg".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::placeholder_jpeg;
    use crate::error::MediaError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // -----------------------------------------------------------------------
    // Synthetic codecs with exactly-known size curves
    // -----------------------------------------------------------------------

    /// Encoded size is `curve(quality)`; decode always succeeds with the
    /// configured dimensions.
    struct CurveCodec {
        width: u32,
        height: u32,
        curve: fn(f32) -> usize,
        encodes: AtomicUsize,
    }

    impl CurveCodec {
        fn new(width: u32, height: u32, curve: fn(f32) -> usize) -> Self {
            Self {
                width,
                height,
                curve,
                encodes: AtomicUsize::new(0),
            }
        }
    }

    struct FakeImage {
        width: u32,
        height: u32,
    }

    impl ImageCodec for CurveCodec {
        type Image = FakeImage;

        fn decode(&self, _bytes: &[u8]) -> MediaResult<FakeImage> {
            Ok(FakeImage {
                width: self.width,
                height: self.height,
            })
        }

        fn dimensions(&self, image: &FakeImage) -> (u32, u32) {
            (image.width, image.height)
        }

        fn resize(&self, _image: &FakeImage, width: u32, height: u32) -> FakeImage {
            FakeImage { width, height }
        }

        fn encode(&self, _image: &FakeImage, quality: f32) -> MediaResult<Vec<u8>> {
            self.encodes.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0u8; (self.curve)(quality)])
        }
    }

    /// Encoded sizes come from a script indexed by call count; lets tests
    /// model non-monotonic encoders.
    struct ScriptedCodec {
        sizes: Vec<usize>,
        calls: AtomicUsize,
    }

    impl ImageCodec for ScriptedCodec {
        type Image = ();

        fn decode(&self, _bytes: &[u8]) -> MediaResult<()> {
            Ok(())
        }

        fn dimensions(&self, _image: &()) -> (u32, u32) {
            (10, 10)
        }

        fn resize(&self, _image: &(), _width: u32, _height: u32) {}

        fn encode(&self, _image: &(), _quality: f32) -> MediaResult<Vec<u8>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let size = self.sizes[call.min(self.sizes.len() - 1)];
            Ok(vec![0u8; size])
        }
    }

    // -----------------------------------------------------------------------
    // Dimension fitting
    // -----------------------------------------------------------------------

    #[test]
    fn small_images_keep_their_dimensions() {
        assert_eq!(fit_dimensions(800, 600), (800, 600));
        assert_eq!(fit_dimensions(2048, 1024), (2048, 1024));
    }

    #[test]
    fn oversized_longest_edge_is_capped() {
        let (w, h) = fit_dimensions(4096, 2048);
        assert_eq!((w, h), (2048, 1024));
    }

    #[test]
    fn aspect_ratio_is_preserved_with_rounding() {
        let (w, h) = fit_dimensions(3000, 2000);
        assert_eq!(w, 2048);
        // 2000 * (2048/3000) = 1365.33… → 1365
        assert_eq!(h, 1365);
    }

    #[test]
    fn portrait_orientation_caps_height() {
        let (w, h) = fit_dimensions(2000, 3000);
        assert_eq!((w, h), (1365, 2048));
    }

    #[test]
    fn one_pixel_floor_on_extreme_ratios() {
        let (w, h) = fit_dimensions(1_000_000, 1);
        assert_eq!(w, 2048);
        assert_eq!(h, 1);
    }

    // -----------------------------------------------------------------------
    // Quality search
    // -----------------------------------------------------------------------

    #[test]
    fn search_stops_early_within_tolerance() {
        // Linear curve: size = 100_000 * quality. Target 50_000 converges
        // to ~0.49 in a handful of passes.
        let codec = CurveCodec::new(100, 100, |q| (100_000.0 * q) as usize);
        let compressor = Compressor::with_codec(codec);

        let out = compressor.compress(b"src", 50_000).unwrap();
        assert!(out.iterations < MAX_ITERATIONS);
        let relative =
            (out.bytes.len() as f64 - 50_000.0).abs() / 50_000.0;
        assert!(relative < 0.10, "relative error was {relative}");
    }

    #[test]
    fn search_never_exceeds_iteration_cap() {
        // Constant curve far from target: no early stop possible.
        let codec = CurveCodec::new(100, 100, |_| 500_000);
        let compressor = Compressor::with_codec(codec);

        let out = compressor.compress(b"src", 1_000).unwrap();
        assert_eq!(out.iterations, MAX_ITERATIONS);
        assert_eq!(compressor.codec.encodes.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn best_so_far_wins_over_later_worse_candidates() {
        // First pass lands closest; every later pass is further away.
        let codec = ScriptedCodec {
            sizes: vec![2_500, 900, 1_200, 1_300, 1_350, 1_370, 1_380, 1_390],
            calls: AtomicUsize::new(0),
        };
        let compressor = Compressor::with_codec(codec);

        let out = compressor.compress(b"src", 2_000).unwrap();
        assert_eq!(out.iterations, MAX_ITERATIONS);
        assert_eq!(out.bytes.len(), 2_500);
    }

    #[test]
    fn oversized_fake_image_is_downscaled() {
        let codec = CurveCodec::new(4096, 1024, |q| (10_000.0 * q) as usize);
        let compressor = Compressor::with_codec(codec);

        let out = compressor.compress(b"src", 5_000).unwrap();
        assert_eq!((out.width, out.height), (2048, 512));
    }

    #[test]
    fn zero_target_still_terminates() {
        let codec = CurveCodec::new(10, 10, |q| (1_000.0 * q) as usize);
        let compressor = Compressor::with_codec(codec);
        let out = compressor.compress(b"src", 0).unwrap();
        assert!(out.iterations <= MAX_ITERATIONS);
    }

    // -----------------------------------------------------------------------
    // Real codec end to end
    // -----------------------------------------------------------------------

    #[test]
    fn real_jpeg_roundtrip() {
        let source = placeholder_jpeg().unwrap();
        let compressor = Compressor::new();

        let out = compressor.compress(&source, 2_048).unwrap();
        assert_eq!((out.width, out.height), (100, 100));
        assert!(out.iterations <= MAX_ITERATIONS);
        assert_eq!(out.format, "jpeg");
        // The result itself must decode.
        assert!(image::load_from_memory(&out.bytes).is_ok());
    }

    #[test]
    fn undecodable_input_propagates_decode_error() {
        let compressor = Compressor::new();
        let err = compressor.compress(b"not an image", 10_000).unwrap_err();
        assert!(matches!(err, MediaError::Decode(_)));
    }

    // -----------------------------------------------------------------------
    // Target policy
    // -----------------------------------------------------------------------

    #[test]
    fn policy_picks_budget_by_source_size() {
        let policy = TargetPolicy::default();
        assert_eq!(policy.target_for(2 * 1024 * 1024), 200 * 1024);
        assert_eq!(policy.target_for(512 * 1024), 100 * 1024);
        // Exactly 1 MiB is not "larger than".
        assert_eq!(policy.target_for(1024 * 1024), 100 * 1024);
    }

    // -----------------------------------------------------------------------
    // Search-bound properties
    // -----------------------------------------------------------------------

    proptest::proptest! {
        #[test]
        fn search_bounds_hold_for_linear_curves(
            scale in 1_000u64..5_000_000,
            target in 1u64..2_000_000,
            width in 1u32..6_000,
            height in 1u32..6_000,
        ) {
            fn linear(q: f32) -> usize {
                // Per-case scale is injected through a thread local so the
                // curve stays a plain fn pointer.
                SCALE.with(|s| (*s.borrow() as f64 * f64::from(q)) as usize)
            }
            thread_local! {
                static SCALE: std::cell::RefCell<u64> = const { std::cell::RefCell::new(0) };
            }
            SCALE.with(|s| *s.borrow_mut() = scale);

            let codec = CurveCodec::new(width, height, linear);
            let compressor = Compressor::with_codec(codec);
            let out = compressor.compress(b"src", target).unwrap();

            proptest::prop_assert!(out.iterations >= 1 && out.iterations <= MAX_ITERATIONS);
            proptest::prop_assert!(out.width.max(out.height) <= MAX_DIMENSION);
            proptest::prop_assert!(out.quality >= QUALITY_FLOOR && out.quality <= QUALITY_CEIL);
        }
    }
}
