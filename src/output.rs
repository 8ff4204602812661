//! Writing a finished raster to disk.  The raster holds one intensity
//! per pixel; the channel policy decides how that becomes three
//! colour channels.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use image::{self, ColorType, Rgb, RgbImage};

use assemble::Raster;
use error::Error;

/// How one intensity becomes an RGB triple.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChannelPolicy {
    /// `(v, v, v)`.
    Gray,
    /// `(2v, 3v, 4v)`, each channel wrapping at 256.
    Weighted,
}

impl ChannelPolicy {
    /// The triple for intensity `v`.
    pub fn rgb(self, v: u8) -> [u8; 3] {
        match self {
            ChannelPolicy::Gray => [v, v, v],
            ChannelPolicy::Weighted => [v.wrapping_mul(2), v.wrapping_mul(3), v.wrapping_mul(4)],
        }
    }
}

impl FromStr for ChannelPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<ChannelPolicy, Error> {
        match s {
            "gray" | "grey" => Ok(ChannelPolicy::Gray),
            "weighted" => Ok(ChannelPolicy::Weighted),
            _ => Err(Error::Config(format!(
                "unknown palette '{}' (expected gray or weighted)",
                s
            ))),
        }
    }
}

/// Expand the raster into an RGB image.
pub fn to_rgb(raster: &Raster, policy: ChannelPolicy) -> RgbImage {
    RgbImage::from_fn(raster.width as u32, raster.height as u32, |x, y| {
        Rgb(policy.rgb(raster.get(x as usize, y as usize)))
    })
}

/// Write a binary PPM: `P6\n<w> <h>\n255\n` followed by three bytes
/// per pixel.
pub fn write_ppm<W: Write>(out: W, raster: &Raster, policy: ChannelPolicy) -> Result<(), Error> {
    let mut out = BufWriter::new(out);
    write!(out, "P6\n{} {}\n255\n", raster.width, raster.height)?;
    out.write_all(&to_rgb(raster, policy).into_raw())?;
    out.flush()?;
    Ok(())
}

/// Save the raster to `path`.  `.ppm`, `.pnm`, or no extension get the
/// PPM writer above; anything else is encoded by the `image` crate
/// according to its extension.
pub fn save(path: &Path, raster: &Raster, policy: ChannelPolicy) -> Result<(), Error> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_ref().map(|e| e.as_str()) {
        None | Some("ppm") | Some("pnm") => write_ppm(File::create(path)?, raster, policy),
        Some(_) => {
            let rgb = to_rgb(raster, policy);
            image::save_buffer(
                path,
                &rgb.into_raw(),
                raster.width as u32,
                raster.height as u32,
                ColorType::RGB(8),
            )?;
            Ok(())
        }
    }
}
