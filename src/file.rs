//! # Envío de archivos
//! src/file.rs
//!
//! Lectura de un archivo en bloques de tamaño fijo y escritura como chunks
//! sobre el `Response`, con un productor y un consumidor:
//!
//! ```text
//! [thread productor]                      [thread del request]
//!  lee bloque en offset ──► canal(0) ──►  res.write(bloque)
//!  lee bloque en offset ──►          ──►  res.write(bloque)
//!  bloque corto (EOF)   ──►          ──►  res.write(bloque); res.end()
//! ```
//!
//! El canal es de rendezvous (`sync_channel(0)`): a lo sumo un bloque está
//! en vuelo, así que la memoria usada es un solo bloque sin importar el
//! tamaño del archivo. Si el consumidor deja de leer (el cliente se fue), al
//! soltar el receptor el `send` del productor falla y el productor termina.
//! El descriptor se libera cuando el productor termina; `pipe` no retorna
//! hasta entonces.

use crate::error::{Error, FileError, Result};
use crate::http::Response;
use log::{debug, error};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

/// Tamaño de bloque por defecto: 1 MiB
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Archivo abierto para lectura por bloques
#[derive(Debug)]
pub struct FileHandle {
    file: File,
    offset: u64,
    chunk_size: usize,
    modified: SystemTime,
}

/// Lo que el productor le entrega al consumidor
#[derive(Debug)]
enum Block {
    /// Bloque completo; hay más por leer
    Data(Vec<u8>),
    /// Último bloque (posiblemente vacío)
    Last(Vec<u8>),
    Failed(io::Error),
}

impl FileHandle {
    /// Abre `path` para lectura; falla si no existe o es un directorio
    pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> std::result::Result<Self, FileError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => FileError::NotFound(path.display().to_string()),
            _ => FileError::Io(e),
        })?;

        let metadata = file.metadata()?;
        if metadata.is_dir() {
            return Err(FileError::IsDirectory(path.display().to_string()));
        }

        Ok(Self {
            file,
            offset: 0,
            chunk_size: chunk_size.max(1),
            modified: metadata.modified().unwrap_or(UNIX_EPOCH),
        })
    }

    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// ETag: SHA-256 en hex de los segundos de modificación en decimal
    pub fn etag(&self) -> String {
        let seconds = self
            .modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        etag_for(seconds)
    }

    /// Lee hasta `chunk_size` bytes desde el offset actual
    ///
    /// Un resultado más corto que `chunk_size` significa fin de archivo.
    fn read_block(&mut self) -> io::Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(self.offset))?;

        let mut buffer = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < buffer.len() {
            match self.file.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        buffer.truncate(filled);
        self.offset += filled as u64;
        Ok(buffer)
    }

    /// Bucle del productor: lee y entrega bloques hasta EOF, error o hasta
    /// que el consumidor suelte el receptor
    ///
    /// Retorna el offset hasta donde llegó a leer.
    fn produce(mut self, sender: SyncSender<Block>) -> u64 {
        loop {
            let block = match self.read_block() {
                Ok(data) if data.len() < self.chunk_size => Block::Last(data),
                Ok(data) => Block::Data(data),
                Err(e) => Block::Failed(e),
            };
            let done = !matches!(block, Block::Data(_));

            if sender.send(block).is_err() {
                debug!("file consumer stopped at offset {}", self.offset);
                return self.offset;
            }
            if done {
                return self.offset;
            }
        }
    }

    /// Escribe el archivo completo en `res` como chunks y termina la respuesta
    ///
    /// Si la escritura falla, el productor se detiene y el error se propaga.
    /// Si la lectura falla, la conexión se cierra sin terminador para que el
    /// cliente vea el body truncado.
    pub fn pipe(self, res: &mut Response) -> Result<()> {
        let (sender, receiver) = mpsc::sync_channel(0);

        thread::scope(|scope| {
            scope.spawn(move || {
                self.produce(sender);
            });
            consume(receiver, res)
        })
    }
}

fn consume(receiver: Receiver<Block>, res: &mut Response) -> Result<()> {
    for block in receiver {
        match block {
            Block::Data(data) => {
                res.write(&data)?;
            }
            Block::Last(data) => {
                res.write(&data)?;
                return res.end();
            }
            Block::Failed(e) => {
                error!("error reading file: {}", e);
                res.abort_connection();
                return Err(Error::Io(e));
            }
        }
    }

    res.abort_connection();
    Err(Error::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "file producer stopped before end of file",
    )))
}

/// ETag para unos segundos de modificación dados
pub fn etag_for(modified_secs: u64) -> String {
    let digest = Sha256::digest(modified_secs.to_string().as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
