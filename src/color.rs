use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub(crate) struct Rgba {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
    pub(crate) a: u8,
}

impl Rgba {
    pub(crate) const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Same colour with alpha taken from a 0..=1 opacity.
    pub(crate) fn with_opacity(self, opacity: f64) -> Self {
        let a = (opacity.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
        Self { a, ..self }
    }

    pub(crate) fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex).with_context(|| format!("invalid hex colour {s:?}"));
        }
        let c = match s.to_ascii_lowercase().as_str() {
            "black" => Rgba::rgb(0, 0, 0),
            "white" => Rgba::rgb(255, 255, 255),
            "gray" | "grey" => Rgba::rgb(128, 128, 128),
            "yellow" => Rgba::rgb(255, 255, 0),
            "orange" => Rgba::rgb(255, 165, 0),
            "red" => Rgba::rgb(255, 0, 0),
            "blue" => Rgba::rgb(0, 0, 255),
            "green" => Rgba::rgb(0, 128, 0),
            "cyan" => Rgba::rgb(0, 255, 255),
            "magenta" => Rgba::rgb(255, 0, 255),
            "purple" => Rgba::rgb(128, 0, 128),
            "brown" => Rgba::rgb(165, 42, 42),
            _ => bail!("unknown colour {s:?}"),
        };
        Ok(c)
    }
}

fn parse_hex(hex: &str) -> Result<Rgba> {
    if hex.len() != 6 && hex.len() != 8 {
        bail!("expected 6 or 8 hex digits, got {}", hex.len());
    }
    let channel = |i: usize| -> Result<u8> {
        let digits = hex.get(i..i + 2).context("non-ascii hex digits")?;
        Ok(u8::from_str_radix(digits, 16)?)
    };
    let a = if hex.len() == 8 { channel(6)? } else { 255 };
    Ok(Rgba {
        r: channel(0)?,
        g: channel(2)?,
        b: channel(4)?,
        a,
    })
}

impl TryFrom<String> for Rgba {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        Rgba::parse(&s)
    }
}

impl From<Rgba> for String {
    fn from(c: Rgba) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}
