/*!
qvdcodec reads and writes QVD, a proprietary binary container used by a BI tool
to persist a single named table. A QVD file is the concatenation of an XML
metadata header, a NUL sentinel, a sequence of per-column symbol tables, and a
dense bit-packed record section that references those symbols by index.

This crate does not provide a host plugin runtime, a columnar interchange
library, or a CLI — it is the codec those things would embed.

# Examples
```no_run
use qvdcodec::{read, write, Config, Column, FieldValue, StderrLogger, Table};

let table = Table::new(vec![Column::new(
    "X",
    vec![Some(FieldValue::Integer32(7)), None, Some(FieldValue::Integer32(9))],
)]);

let config = Config::new("/tmp/table.qvd");
write(&table, &config, &StderrLogger).unwrap();

let round_tripped = read(&config, &StderrLogger).unwrap();
assert_eq!(round_tripped.no_of_records(), 3);
```
*/

#![allow(dead_code)]

mod bitmask;
mod config;
mod error;
mod header;
mod logger;
mod pipeline;
mod record;
mod symbol;
mod table;
mod value;
mod xml;

pub use config::Config;
pub use error::{QvdError, Result};
pub use header::{FieldHeader, LineageInfo, TableHeader};
pub use logger::{Logger, StderrLogger};
pub use pipeline::{read, write};
pub use table::{Column, Table};
pub use value::{FieldTag, FieldType, FieldValue, NumberFormat};
