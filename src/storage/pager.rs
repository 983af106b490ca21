use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, trace};

use crate::error::{DbError, DbResult};
use crate::storage::page::PAGE_SIZE;

/// Hard cap on the cache (and therefore on the database file): the pager
/// never hands out a page number at or past this.
pub const TABLE_MAX_PAGES: usize = 100;

/// A single 4 KiB page of data.
pub struct Page {
    pub data: [u8; PAGE_SIZE],
}

impl Page {
    fn new() -> Self {
        Page {
            data: [0; PAGE_SIZE],
        }
    }
}

/// Pager: reads/writes 4 KiB pages of the database file and keeps every
/// page it has ever handed out resident in a fixed-size cache. Nothing is
/// evicted and nothing is written back until an explicit flush.
pub struct Pager {
    file: File,
    path: PathBuf,

    /// File length in bytes at the moment the file was opened.
    file_length: u64,

    /// The total number of pages the pager knows about right now,
    /// including newly allocated ones that are not on disk yet.
    num_pages: u32,

    /// `pages[page_num]` holds the page's buffer once it has been
    /// demand-loaded (or freshly allocated).
    pages: [Option<Box<Page>>; TABLE_MAX_PAGES],
}

impl Pager {
    /// Open (or create) the database file at `path`.
    ///
    /// A file whose length is not a whole number of pages was not written
    /// by this engine and is rejected.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let file_length = file.metadata()?.len();
        if file_length % PAGE_SIZE as u64 != 0 {
            return Err(DbError::CorruptFile(format!(
                "{} is not a whole number of pages ({} bytes)",
                path.display(),
                file_length
            )));
        }
        let num_pages = (file_length / PAGE_SIZE as u64) as u32;
        info!(
            "opened {} ({} bytes, {} pages)",
            path.display(),
            file_length,
            num_pages
        );

        Ok(Pager {
            file,
            path,
            file_length,
            num_pages,
            pages: std::array::from_fn(|_| None),
        })
    }

    /// Return the buffer for `page_num`, loading it from disk on first
    /// request. Requesting a page at or past `num_pages` extends the
    /// logical page count; the new page stays zeroed.
    ///
    /// The same page number always yields the same buffer for the
    /// pager's lifetime, so a write through one call is seen by the next.
    pub fn get_page(&mut self, page_num: u32) -> DbResult<&mut Page> {
        if page_num as usize >= TABLE_MAX_PAGES {
            return Err(DbError::PageOutOfBounds(page_num, TABLE_MAX_PAGES));
        }

        if self.pages[page_num as usize].is_none() {
            // Cache miss. Allocate a zeroed buffer and read the page in
            // if it already existed when the file was opened.
            let mut page = Box::new(Page::new());
            let pages_on_disk = (self.file_length / PAGE_SIZE as u64) as u32;

            if page_num < pages_on_disk {
                let offset = page_num as u64 * PAGE_SIZE as u64;
                self.file.seek(SeekFrom::Start(offset))?;

                // A short read leaves the tail of the buffer zeroed.
                let mut filled = 0;
                while filled < PAGE_SIZE {
                    let n = self.file.read(&mut page.data[filled..])?;
                    if n == 0 {
                        break;
                    }
                    filled += n;
                }
                trace!("loaded page {} ({} bytes from disk)", page_num, filled);
            }

            if page_num >= self.num_pages {
                self.num_pages = page_num + 1;
            }
            self.pages[page_num as usize] = Some(page);
        }

        // Safe to unwrap: the slot was just filled if it was empty.
        Ok(self.pages[page_num as usize].as_mut().unwrap())
    }

    /// Write the cached page `page_num` back to disk. The page must be
    /// resident.
    pub fn flush_page(&mut self, page_num: u32) -> DbResult<()> {
        if page_num as usize >= TABLE_MAX_PAGES {
            return Err(DbError::PageOutOfBounds(page_num, TABLE_MAX_PAGES));
        }
        let page = self.pages[page_num as usize]
            .as_ref()
            .ok_or(DbError::PageNotLoaded(page_num))?;

        let offset = page_num as u64 * PAGE_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&page.data)?;
        debug!("flushed page {} to {}", page_num, self.path.display());
        Ok(())
    }

    /// Whether `page_num` currently has a buffer in the cache.
    pub fn is_resident(&self, page_num: u32) -> bool {
        (page_num as usize) < TABLE_MAX_PAGES && self.pages[page_num as usize].is_some()
    }

    /// How many pages the pager knows about (on disk plus newly
    /// allocated).
    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// Until pages are recycled, new pages always go onto the end of the
    /// database file.
    pub fn get_unused_page_num(&self) -> u32 {
        self.num_pages
    }
}
