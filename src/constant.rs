//! This module contains constants that are needed throughout the codebase.

use std::time::Duration;

/// The value of the `language` field that identifies a metadata document as
/// one produced by the Solidity compiler.
///
/// Metadata documents with any other language are not considered during
/// verification.
pub const SOLIDITY_LANGUAGE: &str = "Solidity";

/// The compiler outputs requested for the compilation target when
/// recompiling.
///
/// Verification needs nothing else, so whatever selection the original author
/// requested is replaced by this one.
pub const TARGET_OUTPUT_SELECTION: [&str; 3] = ["evm.bytecode", "evm.deployedBytecode", "metadata"];

/// The prefix used for hex-encoded bytecode and hashes.
pub const HEX_PREFIX: &str = "0x";

/// The values that a node returns from `eth_getCode` for an address that has
/// no code deployed at it.
pub const NO_CODE_VALUES: [&str; 3] = ["", "0x", "0x0"];

/// The number of hex characters at the end of the bytecode that encode the
/// length of the CBOR metadata section.
///
/// These are the final two bytes of the bytecode, interpreted as a big-endian
/// integer.
pub const METADATA_LENGTH_FIELD_HEX_CHARS: usize = 4;

/// The default maximum amount of time to spend obtaining a compiler release
/// before giving up.
pub const DEFAULT_COMPILER_LOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// The default maximum amount of time that a single compiler invocation may
/// run for.
pub const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(300);

/// The default number of candidate addresses whose code is fetched at once.
///
/// A value of `1` gives strictly sequential fetching.
pub const DEFAULT_MATCH_CONCURRENCY: usize = 4;

/// The default value for whether a match that differs only in the trailing
/// metadata section is reported as a partial match.
pub const DEFAULT_PARTIAL_MATCHES_ENABLED: bool = true;

/// The base URL from which native `solc` releases are downloaded.
pub const DEFAULT_SOLC_BINARIES_URL: &str = "https://binaries.soliditylang.org";

/// The pattern that compiler versions must follow before they are looked up.
///
/// This is the `longVersion` format of published releases, such as
/// `0.8.19+commit.7dd6d404` or `0.4.26-nightly.2018.9.25+commit.1b8334e5`.
pub const RELEASE_VERSION_PATTERN: &str =
    r"^\d+\.\d+\.\d+(-nightly\.\d{4}\.\d{1,2}\.\d{1,2})?\+commit\.[0-9a-f]{8}$";

/// The name of the release index published for each platform.
pub const SOLC_RELEASE_LIST_FILE: &str = "list.json";

/// The name given to cached compiler executables.
pub const SOLC_EXECUTABLE_NAME: &str = "solc";

/// The default maximum amount of time to wait for the code at a single
/// candidate address.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// The JSON-RPC protocol version sent with node requests.
pub const JSON_RPC_VERSION: &str = "2.0";

/// The block tag used when fetching deployed code.
pub const LATEST_BLOCK_TAG: &str = "latest";

/// The length of an account address in bytes.
pub const ADDRESS_LENGTH_BYTES: usize = 20;
