use crate::error::ColorParseError;

// ============================================================================
// Preset swatches
// ============================================================================

/// Swatch grid shown under the picker, two rows of eight.
pub const PRESETS: [[&str; 8]; 2] = [
    ["#FFB6C1", "#FFA07A", "#FFE4B5", "#D3D3D3", "#87CEEB", "#C0C0C0", "#FFC0CB", "#FFFFFF"],
    ["#DC143C", "#FF4500", "#FFD700", "#90EE90", "#4169E1", "#696969", "#FF69B4", "#FDF5E6"],
];

/// Color shown before the user touches anything.
pub const INITIAL_HEX: &str = "#D65064";

/// Picker position shown before the user touches anything. Not derived from
/// [`INITIAL_HEX`]; the two start out of sync.
pub const INITIAL_HSV: Hsv = Hsv { h: 214.0, s: 96.0, v: 100.0 };

// ============================================================================
// HSV triple
// ============================================================================

/// Hue in degrees, saturation and value in percent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hsv {
    pub h: f32,
    pub s: f32,
    pub v: f32,
}

impl Hsv {
    pub fn new(h: f32, s: f32, v: f32) -> Self {
        Self { h, s, v }
    }

    /// Clamp into h ∈ [0, 360], s, v ∈ [0, 100].
    pub fn clamped(self) -> Self {
        Self {
            h: self.h.clamp(0.0, 360.0),
            s: self.s.clamp(0.0, 100.0),
            v: self.v.clamp(0.0, 100.0),
        }
    }

    pub fn to_rgb(self) -> [u8; 3] {
        hsv_to_rgb(self.h, self.s, self.v)
    }

    pub fn to_hex(self) -> String {
        let [r, g, b] = self.to_rgb();
        rgb_to_hex(r, g, b)
    }
}

// ============================================================================
// ColorModel: HSV is authoritative, hex is a cache
// ============================================================================

/// What the toolbar prints under the picker.
#[derive(Clone, Debug, PartialEq)]
pub struct Readout {
    /// Upper-case hex without the leading `#`.
    pub hex: String,
    pub h: i32,
    pub s: i32,
    pub v: i32,
}

#[derive(Clone, Debug)]
pub struct ColorModel {
    hsv: Hsv,
    hex: String,
}

impl Default for ColorModel {
    fn default() -> Self {
        Self {
            hsv: INITIAL_HSV,
            hex: INITIAL_HEX.to_string(),
        }
    }
}

impl ColorModel {
    pub fn from_hsv(hsv: Hsv) -> Self {
        Self { hsv, hex: hsv.to_hex() }
    }

    /// Replace the triple and recompute the hex cache. Callers clamp first.
    pub fn update(&mut self, h: f32, s: f32, v: f32) {
        self.hsv = Hsv { h, s, v };
        self.hex = self.hsv.to_hex();
    }

    /// Set the color from a swatch without touching the HSV triple.
    ///
    /// The picker indicator keeps pointing at the old HSV position afterwards.
    pub fn set_direct(&mut self, hex: &str) -> Result<(), ColorParseError> {
        parse_hex(hex)?;
        log::debug!("color set directly to {}, picker left at {:?}", hex, self.hsv);
        self.hex = hex.to_string();
        Ok(())
    }

    pub fn hsv(&self) -> Hsv {
        self.hsv
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// RGB of the hex cache (which is what gets painted).
    pub fn rgb(&self) -> [u8; 3] {
        // The cache only ever holds validated strings.
        parse_hex(&self.hex).unwrap_or([0, 0, 0])
    }

    pub fn readout(&self) -> Readout {
        Readout {
            hex: self.hex.trim_start_matches('#').to_uppercase(),
            h: self.hsv.h.round() as i32,
            s: self.hsv.s.round() as i32,
            v: self.hsv.v.round() as i32,
        }
    }
}

// -- Colour-space conversions -----------------------------------

/// Sector conversion. `s` and `v` are percentages; output channels are
/// rounded to the nearest integer.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let s = s / 100.0;
    let v = v / 100.0;
    let sector = (h / 60.0).floor();
    let f = h / 60.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    let (r, g, b) = match (sector as i32).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    [to_channel(r), to_channel(g), to_channel(b)]
}

fn to_channel(x: f32) -> u8 {
    (x * 255.0).round().clamp(0.0, 255.0) as u8
}

pub fn rgb_to_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

/// Parse `#rrggbb` (the `#` is optional, digits are case-insensitive).
pub fn parse_hex(s: &str) -> Result<[u8; 3], ColorParseError> {
    let digits = s.trim().trim_start_matches('#');
    if digits.len() != 6 {
        return Err(ColorParseError::Length(s.to_string()));
    }
    let mut rgb = [0u8; 3];
    for (i, channel) in rgb.iter_mut().enumerate() {
        let pair = digits
            .get(i * 2..i * 2 + 2)
            .ok_or_else(|| ColorParseError::Digit(s.to_string()))?;
        *channel =
            u8::from_str_radix(pair, 16).map_err(|_| ColorParseError::Digit(s.to_string()))?;
    }
    Ok(rgb)
}

/// Parse `H,S,V` as typed on the command line.
pub fn parse_hsv(s: &str) -> Result<Hsv, ColorParseError> {
    let bad = || ColorParseError::Hsv(s.to_string());
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|_| bad())?;
    let &[h, sat, v] = parts.as_slice() else {
        return Err(bad());
    };
    if !(0.0..=360.0).contains(&h) || !(0.0..=100.0).contains(&sat) || !(0.0..=100.0).contains(&v) {
        return Err(bad());
    }
    Ok(Hsv::new(h, sat, v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_colors() {
        assert_eq!(Hsv::new(0.0, 0.0, 0.0).to_hex(), "#000000");
        assert_eq!(Hsv::new(0.0, 0.0, 100.0).to_hex(), "#ffffff");
        assert_eq!(Hsv::new(120.0, 100.0, 100.0).to_hex(), "#00ff00");
        assert_eq!(Hsv::new(240.0, 100.0, 100.0).to_hex(), "#0000ff");
        assert_eq!(Hsv::new(0.0, 100.0, 100.0).to_hex(), "#ff0000");
    }

    #[test]
    fn full_turn_hue_is_red() {
        assert_eq!(hsv_to_rgb(360.0, 100.0, 100.0), [255, 0, 0]);
    }

    #[test]
    fn hex_matches_conversion_across_the_wheel() {
        for h in (0..360).step_by(15) {
            for s in (0..=100).step_by(20) {
                for v in (0..=100).step_by(20) {
                    let hsv = Hsv::new(h as f32, s as f32, v as f32);
                    assert_eq!(parse_hex(&hsv.to_hex()), Ok(hsv.to_rgb()), "{:?}", hsv);
                }
            }
        }
    }

    #[test]
    fn update_recomputes_hex() {
        let mut model = ColorModel::default();
        model.update(200.0, 25.0, 25.0);
        assert_eq!(model.hsv(), Hsv::new(200.0, 25.0, 25.0));
        assert_eq!(model.hex(), "#303a40");
        assert_eq!(model.rgb(), [0x30, 0x3a, 0x40]);
    }

    #[test]
    fn preset_bypasses_hsv() {
        let mut model = ColorModel::default();
        model.update(10.0, 20.0, 30.0);
        model.set_direct(PRESETS[1][0]).unwrap();
        assert_eq!(model.hex(), "#DC143C");
        assert_eq!(model.hsv(), Hsv::new(10.0, 20.0, 30.0));
    }

    #[test]
    fn set_direct_rejects_garbage() {
        let mut model = ColorModel::default();
        assert!(model.set_direct("#12345").is_err());
        assert!(model.set_direct("#zzzzzz").is_err());
        assert_eq!(model.hex(), INITIAL_HEX);
    }

    #[test]
    fn initial_state_is_out_of_sync() {
        let model = ColorModel::default();
        assert_eq!(model.hex(), "#D65064");
        assert_ne!(INITIAL_HSV.to_hex(), "#d65064");
    }

    #[test]
    fn readout_is_uppercase_and_rounded() {
        let mut model = ColorModel::default();
        model.update(199.6, 25.4, 74.5);
        let r = model.readout();
        assert_eq!(r.hex, model.hex().trim_start_matches('#').to_uppercase());
        assert_eq!((r.h, r.s, r.v), (200, 25, 75));
    }

    #[test]
    fn parse_hex_variants() {
        assert_eq!(parse_hex("#FdF5e6"), Ok([0xfd, 0xf5, 0xe6]));
        assert_eq!(parse_hex("00ff00"), Ok([0, 255, 0]));
        assert!(matches!(parse_hex("#fff"), Err(ColorParseError::Length(_))));
        assert!(matches!(parse_hex("#gg0000"), Err(ColorParseError::Digit(_))));
    }

    #[test]
    fn parse_hsv_bounds() {
        assert_eq!(parse_hsv("200, 25, 25"), Ok(Hsv::new(200.0, 25.0, 25.0)));
        assert!(parse_hsv("361,0,0").is_err());
        assert!(parse_hsv("10,20").is_err());
        assert!(parse_hsv("a,b,c").is_err());
    }
}
