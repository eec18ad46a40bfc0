use log::{debug, warn};

use chrono::naive::NaiveDate;
use chrono::Duration;

use super::aggregate::{aggregate_countries, CountryAggregate};
use super::casing::camel_case_keys;
use super::csse::{CsseDailyReports, Error, RowSource};
use super::naive_today;
use super::report::{normalize_row, RawRow};


// How many calendar days behind "now" a substituted report may lie before a
// fetch failure becomes terminal.
static MAX_LOOKBACK_DAYS: i64 = 7;


pub fn parse_target_date(s: &str) -> Result<NaiveDate, Error> {
	let trimmed = s.trim();
	// ISO dates plus the feed's own US-style spelling
	NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
		.or_else(|_| NaiveDate::parse_from_str(trimmed, "%m/%d/%Y"))
		.map_err(|_| Error::InvalidDate(s.into()))
}


pub struct DailyReports<S> {
	source: S,
}

impl DailyReports<CsseDailyReports> {
	pub fn new() -> Self {
		Self{source: CsseDailyReports::new()}
	}

	pub fn from_env() -> Self {
		Self{source: CsseDailyReports::from_env()}
	}
}

impl<S: RowSource> DailyReports<S> {
	pub fn with_source(source: S) -> Self {
		Self{source}
	}

	// Raw mode: rows come back key-folded and mutated, but skip the numeric
	// normalization and the country/state rollup entirely.
	pub fn raw(&self, target: NaiveDate) -> Result<Vec<RawRow>, Error> {
		self.raw_with(target, |row, _| Some(row))
	}

	pub fn raw_with<F>(&self, target: NaiveDate, mutator: F) -> Result<Vec<RawRow>, Error>
		where F: FnMut(RawRow, usize) -> Option<RawRow>
	{
		self.resolve(target, mutator)
	}

	pub fn countries(&self, target: NaiveDate) -> Result<Vec<CountryAggregate>, Error> {
		self.countries_with(target, |row, _| Some(row))
	}

	pub fn countries_with<F>(&self, target: NaiveDate, mutator: F) -> Result<Vec<CountryAggregate>, Error>
		where F: FnMut(RawRow, usize) -> Option<RawRow>
	{
		let rows = self.resolve(target, mutator)?;
		let mut records = Vec::with_capacity(rows.len());
		for row in rows {
			if let Some(rec) = normalize_row(row) {
				records.push(rec);
			}
		}
		Ok(aggregate_countries(&records))
	}

	pub fn countries_at(&self, target: &str) -> Result<Vec<CountryAggregate>, Error> {
		self.countries(parse_target_date(target)?)
	}

	pub fn latest(&self) -> Result<Vec<CountryAggregate>, Error> {
		self.countries(naive_today())
	}

	// Both modes funnel through here, so the key folding and the caller's
	// mutator see exactly the same rows either way. The mutator index is the
	// row's position in the fetched batch, dropped rows included.
	fn resolve<F>(&self, target: NaiveDate, mut mutator: F) -> Result<Vec<RawRow>, Error>
		where F: FnMut(RawRow, usize) -> Option<RawRow>
	{
		let rows = self.resolve_rows(target)?;
		let mut result = Vec::with_capacity(rows.len());
		for (i, row) in rows.into_iter().enumerate() {
			let row = camel_case_keys(row);
			if let Some(row) = mutator(row, i) {
				result.push(row);
			}
		}
		Ok(result)
	}

	// Daily reports appear with some delay, and the most recent days may not
	// exist yet. Walk backwards one calendar day at a time until a report
	// turns up; a failed day already more than MAX_LOOKBACK_DAYS behind now
	// is terminal. Missing reports and transport failures take the same
	// fallback path.
	fn resolve_rows(&self, target: NaiveDate) -> Result<Vec<RawRow>, Error> {
		let today = naive_today();
		let mut date = target;
		loop {
			match self.source.fetch_rows(date) {
				Ok(rows) => {
					if date != target {
						debug!("substituted daily report of {} for requested {}", date, target);
					}
					return Ok(rows)
				},
				Err(err) => {
					if (today - date).num_days() > MAX_LOOKBACK_DAYS {
						return Err(err)
					}
					warn!("daily report for {} unavailable ({}), trying the previous day", date, err);
					date = date - Duration::days(1);
				},
			}
		}
	}
}


#[cfg(test)]
mod tests {
	use std::cell::RefCell;
	use std::collections::HashMap;

	use super::*;
	use crate::csse::decode_rows;

	static REPORT: &str = "\
FIPS,Admin2,Province_State,Country_Region,Last_Update,Lat,Long_,Confirmed,Deaths,Recovered,Active,Combined_Key
06037,Los Angeles,California,US,2020-04-01 21:58:49,34.3088,-118.2282,10,1,2,7,\"Los Angeles, California, US\"
36061,New York,New York,US,2020-04-01 21:58:49,40.7672,-73.9714,5,0,1,4,\"New York, New York, US\"
,,,Italy,2020-04-01 21:58:49,41.8719,12.5674,7,2,1,4,Italy
";

	struct FakeSource {
		reports: HashMap<NaiveDate, &'static str>,
		attempts: RefCell<Vec<NaiveDate>>,
	}

	impl FakeSource {
		fn new(reports: Vec<(NaiveDate, &'static str)>) -> Self {
			Self{
				reports: reports.into_iter().collect(),
				attempts: RefCell::new(Vec::new()),
			}
		}

		fn attempts(&self) -> Vec<NaiveDate> {
			self.attempts.borrow().clone()
		}
	}

	impl RowSource for FakeSource {
		fn fetch_rows(&self, date: NaiveDate) -> Result<Vec<RawRow>, Error> {
			self.attempts.borrow_mut().push(date);
			match self.reports.get(&date) {
				Some(text) => decode_rows(text.as_bytes()),
				None => Err(Error::NotFound(date)),
			}
		}
	}

	fn days_ago(n: i64) -> NaiveDate {
		naive_today() - Duration::days(n)
	}

	#[test]
	fn aggregates_the_requested_day() {
		let target = days_ago(1);
		let reports = DailyReports::with_source(FakeSource::new(vec![(target, REPORT)]));
		let countries = reports.countries(target).unwrap();
		assert_eq!(countries.len(), 2);
		assert_eq!(&countries[0].name[..], "US");
		assert_eq!(countries[0].confirmed, 15);
		assert_eq!(countries[0].active, 11);
		assert_eq!(&countries[0].states[0].name[..], "California");
		assert_eq!(&countries[1].name[..], "Italy");
		assert_eq!(countries[1].states, vec![]);
	}

	#[test]
	fn falls_back_to_the_most_recent_published_day() {
		let published = days_ago(2);
		let source = FakeSource::new(vec![(published, REPORT)]);
		let reports = DailyReports::with_source(source);
		let countries = reports.countries(days_ago(0)).unwrap();
		assert_eq!(countries.len(), 2);
		assert_eq!(reports.source.attempts(), vec![days_ago(0), days_ago(1), days_ago(2)]);
	}

	#[test]
	fn a_future_target_walks_back_into_range() {
		let published = days_ago(0);
		let reports = DailyReports::with_source(FakeSource::new(vec![(published, REPORT)]));
		let tomorrow = naive_today() + Duration::days(1);
		let countries = reports.countries(tomorrow).unwrap();
		assert_eq!(countries.len(), 2);
		assert_eq!(reports.source.attempts(), vec![tomorrow, days_ago(0)]);
	}

	#[test]
	fn a_stale_target_fails_on_its_single_attempt() {
		let target = days_ago(10);
		let reports = DailyReports::with_source(FakeSource::new(vec![]));
		match reports.countries(target) {
			Err(Error::NotFound(date)) => assert_eq!(date, target),
			other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
		}
		assert_eq!(reports.source.attempts(), vec![target]);
	}

	#[test]
	fn the_fallback_stops_once_past_the_lookback_window() {
		let reports = DailyReports::with_source(FakeSource::new(vec![]));
		match reports.countries(days_ago(5)) {
			Err(Error::NotFound(date)) => assert_eq!(date, days_ago(8)),
			other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
		}
		let attempts = reports.source.attempts();
		assert_eq!(attempts.first(), Some(&days_ago(5)));
		assert_eq!(attempts.last(), Some(&days_ago(8)));
		assert_eq!(attempts.len(), 4);
	}

	#[test]
	fn raw_mode_returns_key_folded_rows_without_aggregation() {
		let target = days_ago(1);
		let reports = DailyReports::with_source(FakeSource::new(vec![(target, REPORT)]));
		let rows = reports.raw(target).unwrap();
		assert_eq!(rows.len(), 3);
		assert_eq!(rows[0].get("provinceState"), Some("California"));
		assert_eq!(rows[0].get("countryRegion"), Some("US"));
		assert_eq!(rows[0].get("long"), Some("-118.2282"));
		// raw mode keeps string cells and the feed's own active column
		assert_eq!(rows[0].get("confirmed"), Some("10"));
		assert_eq!(rows[0].get("active"), Some("7"));
	}

	#[test]
	fn the_mutator_applies_in_aggregate_mode() {
		let target = days_ago(1);
		let reports = DailyReports::with_source(FakeSource::new(vec![(target, REPORT)]));
		let countries = reports.countries_with(target, |mut row, _| {
			if row.get("countryRegion") == Some("US") {
				row.set("countryRegion", "United States");
			}
			Some(row)
		}).unwrap();
		let names: Vec<&str> = countries.iter().map(|c| &c.name[..]).collect();
		assert_eq!(names, vec!["United States", "Italy"]);
	}

	#[test]
	fn the_mutator_applies_identically_in_raw_mode() {
		let target = days_ago(1);
		let reports = DailyReports::with_source(FakeSource::new(vec![(target, REPORT)]));
		let rows = reports.raw_with(target, |mut row, _| {
			if row.get("countryRegion") == Some("US") {
				row.set("countryRegion", "United States");
			}
			Some(row)
		}).unwrap();
		assert!(rows.iter().all(|r| r.get("countryRegion") != Some("US")));
		assert_eq!(rows.iter().filter(|r| r.get("countryRegion") == Some("United States")).count(), 2);
	}

	#[test]
	fn the_mutator_can_drop_rows_and_sees_batch_positions() {
		let target = days_ago(1);
		let reports = DailyReports::with_source(FakeSource::new(vec![(target, REPORT)]));
		let indices = RefCell::new(Vec::new());
		let rows = reports.raw_with(target, |row, i| {
			indices.borrow_mut().push(i);
			if row.get("countryRegion") == Some("Italy") {
				None
			} else {
				Some(row)
			}
		}).unwrap();
		assert_eq!(rows.len(), 2);
		assert_eq!(*indices.borrow(), vec![0, 1, 2]);
	}

	#[test]
	fn dropped_rows_never_reach_the_aggregates() {
		let target = days_ago(1);
		let reports = DailyReports::with_source(FakeSource::new(vec![(target, REPORT)]));
		let countries = reports.countries_with(target, |row, _| {
			if row.get("countryRegion") == Some("US") {
				None
			} else {
				Some(row)
			}
		}).unwrap();
		let names: Vec<&str> = countries.iter().map(|c| &c.name[..]).collect();
		assert_eq!(names, vec!["Italy"]);
	}

	#[test]
	fn invalid_target_dates_fail_before_any_fetch() {
		let reports = DailyReports::with_source(FakeSource::new(vec![]));
		match reports.countries_at("soon") {
			Err(Error::InvalidDate(s)) => assert_eq!(s, "soon"),
			other => panic!("expected InvalidDate, got {:?}", other.map(|_| ())),
		}
		assert_eq!(reports.source.attempts(), vec![]);
	}

	#[test]
	fn target_dates_parse_in_both_supported_spellings() {
		assert_eq!(parse_target_date("2020-04-01").unwrap(), NaiveDate::from_ymd(2020, 4, 1));
		assert_eq!(parse_target_date("04/01/2020").unwrap(), NaiveDate::from_ymd(2020, 4, 1));
		assert!(parse_target_date("2020-13-01").is_err());
	}
}
