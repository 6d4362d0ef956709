//! Adapter for data output

use std::fmt::Display;

use chrono::Utc;
use clap::ValueEnum;

use self::influx::ToLineProtocol;

/// Anything the console can print.
pub trait ToOutput: Display + ToLineProtocol {}

/// Console output format.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    /// Human readable line
    #[default]
    Stringify,
    /// InfluxDB Line Protocol
    Influxdb,
}

impl OutputFormat {
    pub fn render(self, item: &impl ToOutput) -> String {
        match self {
            OutputFormat::Stringify => item.to_string(),
            OutputFormat::Influxdb => item
                .to_lineprotocol()
                .add_time(Some(Utc::now()))
                .to_string(),
        }
    }
}

pub mod influx {
    use chrono::{DateTime, Utc};
    use std::fmt;

    pub trait ToLineProtocol {
        fn to_lineprotocol(&self) -> LineProtocol;
    }

    pub enum LineProtocolValue {
        Float(f64),
        Boolean(bool),
    }

    impl fmt::Display for LineProtocolValue {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::Float(x) => write!(f, "{}", x),
                Self::Boolean(x) => write!(f, "{}", x),
            }
        }
    }

    impl From<f64> for LineProtocolValue {
        fn from(x: f64) -> Self {
            LineProtocolValue::Float(x)
        }
    }

    impl From<bool> for LineProtocolValue {
        fn from(x: bool) -> Self {
            LineProtocolValue::Boolean(x)
        }
    }

    /// One point in InfluxDB line protocol, built up field by field.
    ///
    /// Measurement and field names are fixed identifiers and written as they are.
    pub struct LineProtocol {
        measurement: &'static str,
        values: Vec<(&'static str, LineProtocolValue)>,
        time: Option<DateTime<Utc>>,
    }

    impl LineProtocol {
        pub fn new(measurement: &'static str) -> LineProtocol {
            LineProtocol {
                measurement,
                values: vec![],
                time: None,
            }
        }

        pub fn add_value<V>(mut self, name: &'static str, value: V) -> LineProtocol
        where
            V: Into<LineProtocolValue>,
        {
            self.values.push((name, value.into()));
            self
        }

        /// Timestamp of the point. Without one, the server assigns its receive time.
        pub fn add_time(mut self, time: Option<DateTime<Utc>>) -> LineProtocol {
            self.time = time;
            self
        }
    }

    impl fmt::Display for LineProtocol {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let value_string = self
                .values
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join(",");
            write!(f, "{} {}", self.measurement, value_string)?;
            if let Some(nanos) = self.time.and_then(|t| t.timestamp_nanos_opt()) {
                write!(f, " {}", nanos)?;
            }
            Ok(())
        }
    }

}
