//! `rfuse3::raw::Filesystem` implementation for [`RemoteFs`].
//!
//! Kernel requests address nodes by inode; this layer resolves them to absolute
//! paths through the inode table, forwards to the dispatcher and wraps the answers
//! into FUSE replies. Replies that must carry attributes (entries, setattr) fetch
//! them with one extra lookup.

use std::ffi::{OsStr, OsString};
use std::num::NonZeroU32;
use std::pin::Pin;
use std::time::Duration;

use futures_util::stream::{self, Stream};
use rfuse3::Result as FuseResult;
use rfuse3::raw::Filesystem;
use rfuse3::raw::Request;
use rfuse3::raw::reply::{
    DirectoryEntry, DirectoryEntryPlus, FileAttr, ReplyAttr, ReplyCreated, ReplyData,
    ReplyDirectory, ReplyDirectoryPlus, ReplyEntry, ReplyInit, ReplyOpen, ReplyStatFs, ReplyWrite,
};
use rfuse3::{FileType, SetAttr, Timestamp};
use tracing::debug;

use super::inode::parent_path;
use super::{RemoteFs, child_path};
use crate::attr::PosixAttributes;
use crate::client::FileSystemService;
use crate::error::FsError;

/// Zero: the kernel must ask again instead of caching on our behalf.
const TTL: Duration = Duration::ZERO;
const MAX_WRITE: NonZeroU32 = NonZeroU32::new(1024 * 1024).unwrap();
const BLOCK_SIZE: u32 = 4096;

fn utf8(name: &OsStr) -> Result<&str, FsError> {
    name.to_str().ok_or(FsError::InvalidArgument)
}

fn kind_of(attrs: &PosixAttributes) -> FileType {
    if attrs.is_dir() {
        FileType::Directory
    } else {
        FileType::RegularFile
    }
}

/// FUSE attribute reply for a translated node.
fn file_attr(ino: u64, attrs: &PosixAttributes, req: &Request) -> FileAttr {
    let mtime = Timestamp::new(attrs.mtime, 0);
    FileAttr {
        ino,
        size: attrs.size,
        blocks: attrs.size.div_ceil(512),
        atime: mtime,
        mtime,
        ctime: mtime,
        #[cfg(target_os = "macos")]
        crtime: mtime,
        kind: kind_of(attrs),
        perm: attrs.perm(),
        nlink: attrs.nlink,
        uid: req.uid,
        gid: req.gid,
        rdev: 0,
        #[cfg(target_os = "macos")]
        flags: 0,
        blksize: BLOCK_SIZE,
    }
}

impl<S> RemoteFs<S>
where
    S: FileSystemService,
{
    fn inode_path(&self, ino: u64) -> Result<String, FsError> {
        self.inodes.path_of(ino).ok_or(FsError::NotFound)
    }

    fn child_of(&self, parent: u64, name: &OsStr) -> Result<String, FsError> {
        let parent = self.inode_path(parent)?;
        Ok(child_path(&parent, utf8(name)?))
    }

    /// Entry reply for `path`; counts one kernel lookup.
    async fn entry(&self, path: &str, req: &Request) -> Result<ReplyEntry, FsError> {
        let attrs = self.get_attributes(path).await?;
        let ino = self.inodes.remember(path);
        Ok(ReplyEntry {
            ttl: TTL,
            attr: file_attr(ino, &attrs, req),
            generation: 0,
        })
    }

    /// Attributes of a listed child; `None` when it vanished since the listing.
    async fn listed_child(&self, path: &str) -> Result<Option<PosixAttributes>, FsError> {
        match self.get_attributes(path).await {
            Ok(attrs) => Ok(Some(attrs)),
            Err(FsError::NotFound) => {
                debug!(path, "listed entry vanished");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl<S> Filesystem for RemoteFs<S>
where
    S: FileSystemService + 'static,
{
    type DirEntryStream<'a>
        = Pin<Box<dyn Stream<Item = FuseResult<DirectoryEntry>> + Send + 'a>>
    where
        Self: 'a;

    type DirEntryPlusStream<'a>
        = Pin<Box<dyn Stream<Item = FuseResult<DirectoryEntryPlus>> + Send + 'a>>
    where
        Self: 'a;

    async fn init(&self, _req: Request) -> FuseResult<ReplyInit> {
        Ok(ReplyInit {
            max_write: MAX_WRITE,
        })
    }

    async fn destroy(&self, _req: Request) {}

    async fn lookup(&self, req: Request, parent: u64, name: &OsStr) -> FuseResult<ReplyEntry> {
        let path = self.child_of(parent, name)?;
        Ok(self.entry(&path, &req).await?)
    }

    async fn forget(&self, _req: Request, inode: u64, nlookup: u64) {
        self.inodes.forget(inode, nlookup);
    }

    async fn batch_forget(&self, _req: Request, inodes: &[(u64, u64)]) {
        for &(inode, nlookup) in inodes {
            self.inodes.forget(inode, nlookup);
        }
    }

    async fn getattr(
        &self,
        req: Request,
        ino: u64,
        _fh: Option<u64>,
        _flags: u32,
    ) -> FuseResult<ReplyAttr> {
        let path = self.inode_path(ino)?;
        let attrs = self.get_attributes(&path).await?;
        Ok(ReplyAttr {
            ttl: TTL,
            attr: file_attr(ino, &attrs, &req),
        })
    }

    // only a size change reaches the backend; mode and times are accepted and dropped
    async fn setattr(
        &self,
        req: Request,
        ino: u64,
        _fh: Option<u64>,
        set_attr: SetAttr,
    ) -> FuseResult<ReplyAttr> {
        let path = self.inode_path(ino)?;
        if let Some(size) = set_attr.size {
            self.truncate(&path, size).await?;
        }
        if let Some(mode) = set_attr.mode {
            self.set_permissions(&path, mode).await?;
        }
        if set_attr.atime.is_some() || set_attr.mtime.is_some() {
            self.set_timestamps(&path).await?;
        }
        let attrs = self.get_attributes(&path).await?;
        Ok(ReplyAttr {
            ttl: TTL,
            attr: file_attr(ino, &attrs, &req),
        })
    }

    async fn mknod(
        &self,
        req: Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _rdev: u32,
    ) -> FuseResult<ReplyEntry> {
        let path = self.child_of(parent, name)?;
        self.create_node(&path, mode).await?;
        Ok(self.entry(&path, &req).await?)
    }

    async fn mkdir(
        &self,
        req: Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
    ) -> FuseResult<ReplyEntry> {
        let path = self.child_of(parent, name)?;
        self.create_directory(&path).await?;
        Ok(self.entry(&path, &req).await?)
    }

    async fn unlink(&self, _req: Request, parent: u64, name: &OsStr) -> FuseResult<()> {
        let path = self.child_of(parent, name)?;
        self.delete_file(&path).await?;
        self.inodes.remove(&path);
        Ok(())
    }

    async fn rmdir(&self, _req: Request, parent: u64, name: &OsStr) -> FuseResult<()> {
        let path = self.child_of(parent, name)?;
        self.delete_directory(&path).await?;
        self.inodes.remove(&path);
        Ok(())
    }

    async fn rename(
        &self,
        _req: Request,
        parent: u64,
        name: &OsStr,
        new_parent: u64,
        new_name: &OsStr,
    ) -> FuseResult<()> {
        let from = self.child_of(parent, name)?;
        let to = self.child_of(new_parent, new_name)?;
        RemoteFs::rename(self, &from, &to).await?;
        self.inodes.rename(&from, &to);
        Ok(())
    }

    async fn open(&self, _req: Request, ino: u64, _flags: u32) -> FuseResult<ReplyOpen> {
        let path = self.inode_path(ino)?;
        RemoteFs::open(self, &path).await?;
        Ok(ReplyOpen { fh: 0, flags: 0 })
    }

    async fn read(
        &self,
        _req: Request,
        ino: u64,
        _fh: u64,
        offset: u64,
        size: u32,
    ) -> FuseResult<ReplyData> {
        let path = self.inode_path(ino)?;
        let data = RemoteFs::read(self, &path, size, offset).await?;
        Ok(ReplyData { data })
    }

    async fn write(
        &self,
        _req: Request,
        ino: u64,
        _fh: u64,
        offset: u64,
        data: &[u8],
        _write_flags: u32,
        _flags: u32,
    ) -> FuseResult<ReplyWrite> {
        let path = self.inode_path(ino)?;
        let written = RemoteFs::write(self, &path, data, offset).await?;
        Ok(ReplyWrite { written })
    }

    async fn statfs(&self, _req: Request, _ino: u64) -> FuseResult<ReplyStatFs> {
        // the backend exposes no capacity figures
        Ok(ReplyStatFs {
            blocks: 0,
            bfree: 0,
            bavail: 0,
            files: 0,
            ffree: u64::MAX,
            bsize: BLOCK_SIZE,
            namelen: 255,
            frsize: BLOCK_SIZE,
        })
    }

    async fn release(
        &self,
        _req: Request,
        inode: u64,
        _fh: u64,
        _flags: u32,
        _lock_owner: u64,
        _flush: bool,
    ) -> FuseResult<()> {
        if let Ok(path) = self.inode_path(inode) {
            RemoteFs::release(self, &path).await;
        }
        Ok(())
    }

    async fn fsync(&self, _req: Request, _inode: u64, _fh: u64, _datasync: bool) -> FuseResult<()> {
        Ok(())
    }

    async fn flush(
        &self,
        _req: Request,
        _inode: u64,
        _fh: u64,
        _lock_owner: u64,
    ) -> FuseResult<()> {
        Ok(())
    }

    async fn opendir(&self, _req: Request, ino: u64, _flags: u32) -> FuseResult<ReplyOpen> {
        self.inode_path(ino)?;
        Ok(ReplyOpen { fh: 0, flags: 0 })
    }

    // cookies: "." = 1, ".." = 2, backend entries from 3; resumes after `offset`
    async fn readdir<'a>(
        &'a self,
        _req: Request,
        ino: u64,
        _fh: u64,
        offset: i64,
    ) -> FuseResult<ReplyDirectory<Self::DirEntryStream<'a>>> {
        let path = self.inode_path(ino)?;
        let names = self.list_directory(&path).await?;

        let mut entries = Vec::with_capacity(names.len());
        for (i, name) in names.into_iter().enumerate().skip(offset.max(0) as usize) {
            let (inode, kind) = match i {
                0 => (ino, FileType::Directory),
                1 => (self.inodes.assign(parent_path(&path)), FileType::Directory),
                _ => {
                    let child = child_path(&path, &name);
                    let Some(attrs) = self.listed_child(&child).await? else {
                        continue;
                    };
                    (self.inodes.assign(&child), kind_of(&attrs))
                }
            };
            entries.push(DirectoryEntry {
                inode,
                kind,
                name: OsString::from(name),
                offset: i as i64 + 1,
            });
        }

        let entries: Self::DirEntryStream<'a> = Box::pin(stream::iter(entries.into_iter().map(Ok)));
        Ok(ReplyDirectory { entries })
    }

    async fn readdirplus<'a>(
        &'a self,
        req: Request,
        ino: u64,
        _fh: u64,
        offset: u64,
        _lock_owner: u64,
    ) -> FuseResult<ReplyDirectoryPlus<Self::DirEntryPlusStream<'a>>> {
        let path = self.inode_path(ino)?;
        let names = self.list_directory(&path).await?;

        let mut entries = Vec::with_capacity(names.len());
        for (i, name) in names.into_iter().enumerate().skip(offset as usize) {
            // the kernel takes no lookup reference on "." and ".."
            let (inode, attrs) = match i {
                0 => (ino, self.get_attributes(&path).await?),
                1 => {
                    let parent = parent_path(&path);
                    (self.inodes.assign(parent), self.get_attributes(parent).await?)
                }
                _ => {
                    let child = child_path(&path, &name);
                    let Some(attrs) = self.listed_child(&child).await? else {
                        continue;
                    };
                    (self.inodes.remember(&child), attrs)
                }
            };
            entries.push(DirectoryEntryPlus {
                inode,
                generation: 0,
                kind: kind_of(&attrs),
                name: OsString::from(name),
                offset: i as i64 + 1,
                attr: file_attr(inode, &attrs, &req),
                entry_ttl: TTL,
                attr_ttl: TTL,
            });
        }

        let entries: Self::DirEntryPlusStream<'a> =
            Box::pin(stream::iter(entries.into_iter().map(Ok)));
        Ok(ReplyDirectoryPlus { entries })
    }

    async fn releasedir(
        &self,
        _req: Request,
        _inode: u64,
        _fh: u64,
        _flags: u32,
    ) -> FuseResult<()> {
        Ok(())
    }

    async fn fsyncdir(
        &self,
        _req: Request,
        _inode: u64,
        _fh: u64,
        _datasync: bool,
    ) -> FuseResult<()> {
        Ok(())
    }

    async fn create(
        &self,
        req: Request,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _flags: u32,
    ) -> FuseResult<ReplyCreated> {
        let path = self.child_of(parent, name)?;
        self.create_file(&path).await?;
        let ReplyEntry { ttl, attr, .. } = self.entry(&path, &req).await?;
        Ok(ReplyCreated {
            ttl,
            attr,
            generation: 0,
            fh: 0,
            flags: 0,
        })
    }

    async fn interrupt(&self, _req: Request, _unique: u64) -> FuseResult<()> {
        Ok(())
    }
}
