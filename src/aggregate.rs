use std::collections::HashMap;

use serde::Serialize;

use smartstring::alias::{String as SmartString};

use super::report::CaseRecord;


#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateAggregate {
	pub name: SmartString,
	pub confirmed: i64,
	pub deaths: i64,
	pub recovered: i64,
	pub active: i64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub latitude: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub longitude: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_update: Option<SmartString>,
}


#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryAggregate {
	pub name: SmartString,
	pub states: Vec<StateAggregate>,
	pub confirmed: i64,
	pub deaths: i64,
	pub recovered: i64,
	pub active: i64,
	pub latitude: f64,
	pub longitude: f64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_update: Option<SmartString>,
}


// Insertion-order grouping: the map only remembers which slot a key owns,
// the groups themselves stay in first-appearance order.
fn group_by<'r, F>(records: &[&'r CaseRecord], key: F) -> Vec<(SmartString, Vec<&'r CaseRecord>)>
	where F: Fn(&'r CaseRecord) -> Option<&'r str>
{
	let mut slots: HashMap<String, usize> = HashMap::new();
	let mut groups: Vec<(SmartString, Vec<&'r CaseRecord>)> = Vec::new();
	for &rec in records.iter() {
		let name = match key(rec) {
			Some(v) => v,
			None => continue,
		};
		let slot = match slots.get(name) {
			Some(slot) => *slot,
			None => {
				let slot = groups.len();
				slots.insert(name.into(), slot);
				groups.push((name.into(), Vec::new()));
				slot
			},
		};
		groups[slot].1.push(rec);
	}
	groups
}

fn sum_of<F: Fn(&CaseRecord) -> i64>(members: &[&CaseRecord], f: F) -> i64 {
	members.iter().map(|r| f(r)).sum()
}

fn first_of<F: Fn(&CaseRecord) -> Option<f64>>(members: &[&CaseRecord], f: F) -> Option<f64> {
	members.iter().filter_map(|r| f(r)).next()
}

// Mean over every member row; rows without coordinates contribute nothing to
// the numerator but still count towards the divisor.
fn mean_of<F: Fn(&CaseRecord) -> Option<f64>>(members: &[&CaseRecord], f: F) -> f64 {
	let sum: f64 = members.iter().filter_map(|r| f(r)).sum();
	sum / (members.len() as f64)
}

fn max_update(members: &[&CaseRecord]) -> Option<SmartString> {
	// raw timestamp strings, compared as written
	members.iter().filter_map(|r| r.last_update.as_ref()).max().cloned()
}


fn state_aggregates(records: &[&CaseRecord]) -> Vec<StateAggregate> {
	let mut result: Vec<StateAggregate> = group_by(records, |r| r.province_state.as_deref())
		.into_iter()
		.map(|(name, members)| StateAggregate{
			name,
			confirmed: sum_of(&members, |r| r.confirmed),
			deaths: sum_of(&members, |r| r.deaths),
			recovered: sum_of(&members, |r| r.recovered),
			active: sum_of(&members, |r| r.active),
			latitude: first_of(&members, |r| r.latitude),
			longitude: first_of(&members, |r| r.longitude),
			last_update: max_update(&members),
		})
		.collect();
	result.sort_by(|a, b| a.name.cmp(&b.name));
	result
}


pub fn aggregate_states(records: &[CaseRecord]) -> Vec<StateAggregate> {
	let refs: Vec<&CaseRecord> = records.iter().collect();
	state_aggregates(&refs)
}


// Countries keep first-appearance order while their state lists are sorted
// by name; the two orderings are deliberately different.
pub fn aggregate_countries(records: &[CaseRecord]) -> Vec<CountryAggregate> {
	let refs: Vec<&CaseRecord> = records.iter().collect();
	group_by(&refs, |r| Some(&r.country_region[..]))
		.into_iter()
		.map(|(name, members)| CountryAggregate{
			name,
			states: state_aggregates(&members),
			confirmed: sum_of(&members, |r| r.confirmed),
			deaths: sum_of(&members, |r| r.deaths),
			recovered: sum_of(&members, |r| r.recovered),
			active: sum_of(&members, |r| r.active),
			latitude: mean_of(&members, |r| r.latitude),
			longitude: mean_of(&members, |r| r.longitude),
			last_update: max_update(&members),
		})
		.collect()
}
