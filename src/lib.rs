pub mod header;
pub mod inflate;
pub mod extract;
pub mod dump;

pub use header::{BlsHeader, HeaderError, FormatVersion, MAGIC_GXSH};
pub use inflate::{inflate_chunked, Inflated, Inflater, DecodeFault, InflateError};
pub use extract::{extract, fragments, Fragment, ExtractSummary};
pub use dump::{dump, dump_file, BlsFile, BlsError, DumpReport};
