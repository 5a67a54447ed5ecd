//! SwiftDAV Core Library
//!
//! A uniform filesystem interface over OpenStack Swift object storage and
//! WebDAV servers: existence checks, reads and writes (buffered or
//! streamed), deletion, directories, copy/move, listing and metadata.

pub mod adapter;
pub mod capability;
pub mod config;
pub mod error;
pub mod normalize;
pub mod openstack;
pub mod options;
pub mod path;
pub mod webdav;

pub use adapter::{collect_stream, create_adapter, ByteStream, FilesystemAdapter, MetadataStream};
pub use capability::{Capabilities, Operation};
pub use config::AdapterConfig;
pub use error::{BackendError, Error, ErrorKind, Result};
pub use normalize::{DirectoryAttributes, FileAttributes, ObjectMetadata, Visibility};
pub use openstack::{MemoryObjectStore, OpenStackAdapter, SwiftClient, SwiftConfig};
pub use options::WriteConfig;
pub use path::PathPrefixer;
pub use webdav::{HttpDavClient, HttpDavConfig, MemoryDavClient, WebDavAdapter};
