use std::fmt::{Display, Formatter};

pub const DEFAULT_COLOR: &str = "#3b82f6";
pub const GRADE_COUNT: usize = 5;

const GRADE_TINTS: [f64; GRADE_COUNT] = [0.80, 0.60, 0.40, 0.20, 0.0];

const WHITE: Rgb = Rgb::new(255, 255, 255);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
	pub r: u8,
	pub g: u8,
	pub b: u8,
}

impl Rgb {
	pub const fn new(r: u8, g: u8, b: u8) -> Self {
		Self { r, g, b }
	}

	pub fn parse_hex(raw: &str) -> Option<Self> {
		let digits = raw.trim().strip_prefix('#')?;
		if !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
			return None;
		}

		match digits.len() {
			6 => Some(Self::new(
				u8::from_str_radix(&digits[0..2], 16).ok()?,
				u8::from_str_radix(&digits[2..4], 16).ok()?,
				u8::from_str_radix(&digits[4..6], 16).ok()?,
			)),
			3 => {
				let expand = |index: usize| {
					u8::from_str_radix(&digits[index..index + 1], 16)
						.ok()
						.map(|value| value * 17)
				};
				Some(Self::new(expand(0)?, expand(1)?, expand(2)?))
			}
			_ => None,
		}
	}

	pub fn to_hex(self) -> String {
		format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
	}

	pub fn mix(self, other: Rgb, amount: f64) -> Rgb {
		let amount = amount.clamp(0.0, 1.0);
		let channel = |from: u8, to: u8| {
			let value = f64::from(from) + (f64::from(to) - f64::from(from)) * amount;
			value.round().clamp(0.0, 255.0) as u8
		};
		Rgb::new(
			channel(self.r, other.r),
			channel(self.g, other.g),
			channel(self.b, other.b),
		)
	}

	pub fn luminance(self) -> f64 {
		fn linear(channel: u8) -> f64 {
			let value = f64::from(channel) / 255.0;
			if value <= 0.03928 {
				value / 12.92
			} else {
				((value + 0.055) / 1.055).powf(2.4)
			}
		}

		0.2126 * linear(self.r) + 0.7152 * linear(self.g) + 0.0722 * linear(self.b)
	}
}

impl Display for Rgb {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.to_hex())
	}
}

pub fn normalize_color(raw: &str) -> String {
	Rgb::parse_hex(raw)
		.map(Rgb::to_hex)
		.unwrap_or_else(|| DEFAULT_COLOR.to_string())
}

pub fn theme_rgb(raw: &str) -> Rgb {
	Rgb::parse_hex(raw)
		.or_else(|| Rgb::parse_hex(DEFAULT_COLOR))
		.unwrap_or(Rgb::new(0x3b, 0x82, 0xf6))
}

pub fn generate_color_levels(base: &str) -> [Rgb; GRADE_COUNT] {
	let base = theme_rgb(base);
	GRADE_TINTS.map(|tint| base.mix(WHITE, tint))
}

pub fn grade_for_count(count: u32, levels: &[u32; GRADE_COUNT]) -> Option<usize> {
	if count == 0 || count < levels[0] {
		return None;
	}

	levels
		.iter()
		.enumerate()
		.filter(|(_, threshold)| count >= **threshold)
		.map(|(index, _)| index)
		.max()
}

pub fn color_for_count(
	count: u32,
	levels: &[u32; GRADE_COUNT],
	palette: &[Rgb; GRADE_COUNT],
) -> Option<Rgb> {
	grade_for_count(count, levels).map(|grade| palette[grade])
}

pub fn levels_are_ascending(levels: &[u32; GRADE_COUNT]) -> bool {
	levels.windows(2).all(|pair| pair[0] <= pair[1])
}
