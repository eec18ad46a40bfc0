use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use smartstring::alias::{String as SmartString};


// One row of a daily report, keyed by whatever headers the feed carried on
// that day. Field order is the upstream column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
	fields: Vec<(SmartString, String)>,
}

impl RawRow {
	pub fn new() -> Self {
		Self{fields: Vec::new()}
	}

	pub fn with_capacity(n: usize) -> Self {
		Self{fields: Vec::with_capacity(n)}
	}

	pub fn push(&mut self, key: SmartString, value: String) {
		self.fields.push((key, value));
	}

	pub fn set(&mut self, key: &str, value: &str) {
		match self.fields.iter_mut().find(|(k, _)| &k[..] == key) {
			Some((_, v)) => *v = value.into(),
			None => self.fields.push((key.into(), value.into())),
		}
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.fields.iter().find(|(k, _)| &k[..] == key).map(|(_, v)| &v[..])
	}

	pub fn remove(&mut self, key: &str) -> Option<String> {
		let i = self.fields.iter().position(|(k, _)| &k[..] == key)?;
		Some(self.fields.remove(i).1)
	}

	// an empty cell counts as absent, like a missing column
	pub fn remove_nonempty(&mut self, key: &str) -> Option<String> {
		match self.remove(key) {
			Some(v) if !v.is_empty() => Some(v),
			_ => None,
		}
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
		self.fields.iter().map(|(k, v)| (&k[..], &v[..]))
	}

	pub fn len(&self) -> usize {
		self.fields.len()
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}
}

impl IntoIterator for RawRow {
	type Item = (SmartString, String);
	type IntoIter = std::vec::IntoIter<(SmartString, String)>;

	fn into_iter(self) -> Self::IntoIter {
		self.fields.into_iter()
	}
}

impl Serialize for RawRow {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(Some(self.fields.len()))?;
		for (k, v) in self.fields.iter() {
			map.serialize_entry(&k[..], v)?;
		}
		map.end()
	}
}


#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub province_state: Option<SmartString>,
	pub country_region: SmartString,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub latitude: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub longitude: Option<f64>,
	pub confirmed: i64,
	pub deaths: i64,
	pub recovered: i64,
	pub active: i64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_update: Option<SmartString>,
	#[serde(flatten)]
	pub extra: RawRow,
}


fn count_value(v: Option<String>) -> i64 {
	let v = match v {
		Some(v) => v,
		None => return 0,
	};
	match v.parse::<i64>() {
		Ok(n) => n,
		// some report generations write counts as floats
		Err(_) => v.parse::<f64>().map(|n| n as i64).unwrap_or(0),
	}
}

fn coordinate(primary: Option<String>, fallback: Option<String>) -> Option<f64> {
	let v = primary.or(fallback)?;
	Some(v.parse::<f64>().unwrap_or(0.0))
}


// Keys must already be camel-cased. Rows without a country are unusable for
// the country/state rollup and normalize to None.
pub fn normalize_row(mut row: RawRow) -> Option<CaseRecord> {
	let country_region: SmartString = match row.remove_nonempty("countryRegion") {
		Some(v) => v.into(),
		None => return None,
	};
	let province_state = row.remove_nonempty("provinceState").map(Into::into);
	let last_update = row.remove_nonempty("lastUpdate").map(Into::into);
	let latitude = coordinate(row.remove_nonempty("latitude"), row.remove_nonempty("lat"));
	let longitude = coordinate(row.remove_nonempty("longitude"), row.remove_nonempty("long"));
	let confirmed = count_value(row.remove_nonempty("confirmed"));
	let deaths = count_value(row.remove_nonempty("deaths"));
	let recovered = count_value(row.remove_nonempty("recovered"));
	// the feed's own active column is inconsistent across generations and is
	// always recomputed
	row.remove("active");
	Some(CaseRecord{
		province_state,
		country_region,
		latitude,
		longitude,
		confirmed,
		deaths,
		recovered,
		active: confirmed - recovered - deaths,
		last_update,
		extra: row,
	})
}
