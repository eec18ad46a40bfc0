use std::env;
use std::fmt;
use std::io;

use log::{debug, trace};

use chrono::naive::NaiveDate;

use csv;
use reqwest;

use smartstring::alias::{String as SmartString};

use super::report::RawRow;


pub static CSSE_DAILY_REPORTS_URL: &str =
	"https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_daily_reports";

pub static URL_ENV_VAR: &str = "COVID_DAILY_URL";


#[derive(Debug)]
pub enum Error {
	InvalidDate(String),
	NotFound(NaiveDate),
	Request(reqwest::Error),
	Decode(csv::Error),
}

impl fmt::Display for Error {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::InvalidDate(s) => write!(f, "invalid target date: {:?}", s),
			Self::NotFound(date) => write!(f, "no daily report published for {}", date),
			Self::Request(e) => fmt::Display::fmt(e, f),
			Self::Decode(e) => fmt::Display::fmt(e, f),
		}
	}
}

impl From<reqwest::Error> for Error {
	fn from(err: reqwest::Error) -> Self {
		Self::Request(err)
	}
}

impl From<csv::Error> for Error {
	fn from(err: csv::Error) -> Self {
		Self::Decode(err)
	}
}

impl std::error::Error for Error {}


// Seam between the pipeline and the upstream resource: ordered rows, keys
// taken from the header line, every cell a string.
pub trait RowSource {
	fn fetch_rows(&self, date: NaiveDate) -> Result<Vec<RawRow>, Error>;
}


pub fn decode_rows<R: io::Read>(r: R) -> Result<Vec<RawRow>, Error> {
	let mut reader = csv::Reader::from_reader(r);
	// older report files lead with a UTF-8 BOM glued to the first header
	let headers: Vec<SmartString> = reader.headers()?
		.iter()
		.map(|h| h.trim_start_matches('\u{feff}').into())
		.collect();
	let mut rows = Vec::new();
	for record in reader.records() {
		let record = record?;
		let mut row = RawRow::with_capacity(headers.len());
		for (key, value) in headers.iter().zip(record.iter()) {
			row.push(key.clone(), value.into());
		}
		rows.push(row);
	}
	Ok(rows)
}


pub struct CsseDailyReports {
	client: reqwest::blocking::Client,
	base_url: String,
}

impl CsseDailyReports {
	pub fn new() -> Self {
		Self::with_base_url(CSSE_DAILY_REPORTS_URL.into())
	}

	pub fn with_base_url(base_url: String) -> Self {
		Self{
			client: reqwest::blocking::Client::new(),
			base_url,
		}
	}

	pub fn from_env() -> Self {
		Self::with_base_url(env::var(URL_ENV_VAR).unwrap_or(CSSE_DAILY_REPORTS_URL.into()))
	}

	fn report_url(&self, date: NaiveDate) -> String {
		format!("{}/{}.csv", self.base_url, date.format("%m-%d-%Y"))
	}
}

impl RowSource for CsseDailyReports {
	fn fetch_rows(&self, date: NaiveDate) -> Result<Vec<RawRow>, Error> {
		let url = self.report_url(date);
		trace!("fetching daily report from {}", url);
		let resp = self.client.get(&url).send()?;
		if resp.status() == reqwest::StatusCode::NOT_FOUND {
			return Err(Error::NotFound(date))
		}
		let resp = resp.error_for_status()?;
		let body = resp.bytes()?;
		let rows = decode_rows(&body[..])?;
		debug!("daily report for {}: {} rows", date, rows.len());
		Ok(rows)
	}
}
