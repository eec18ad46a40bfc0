use smartstring::alias::{String as SmartString};

use super::report::RawRow;


// The daily report headers changed spelling several times over the feed's
// lifetime ("Province/State", "Province_State", "Last Update", "Long_", ...).
// Folding every key to camelCase first gives the rest of the pipeline a
// single spelling to work with.
pub fn camel_case(s: &str) -> SmartString {
	let chars: Vec<char> = s.chars().collect();
	let mut out = SmartString::new();
	let mut words = 0usize;
	let mut prev: Option<char> = None;
	for (i, &c) in chars.iter().enumerate() {
		if !c.is_alphanumeric() {
			prev = None;
			continue
		}
		let starts_word = match prev {
			None => true,
			Some(p) => {
				(c.is_uppercase() && (p.is_lowercase() || p.is_numeric()))
					// last capital of an all-caps run followed by a lowercase
					// letter opens the next word ("FIPSCode" -> fipsCode)
					|| (c.is_uppercase() && p.is_uppercase()
						&& chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false))
					|| (c.is_alphabetic() && p.is_numeric())
			},
		};
		if starts_word {
			if words == 0 {
				out.push(c.to_ascii_lowercase());
			} else {
				out.push(c.to_ascii_uppercase());
			}
			words += 1;
		} else {
			out.push(c.to_ascii_lowercase());
		}
		prev = Some(c);
	}
	out
}


pub fn camel_case_keys(row: RawRow) -> RawRow {
	let mut out = RawRow::with_capacity(row.len());
	for (key, value) in row {
		out.push(camel_case(&key), value);
	}
	out
}
