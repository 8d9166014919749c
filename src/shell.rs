//! Line oriented front end: image creation prompts, login and the command
//! loop. The first word of a line is the command, the rest its parameter.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use log::{info, warn};

use crate::block_dev::{BlockDevice, FileDisk};
use crate::config::BLOCK_SIZE;
use crate::error::{FsError, Result};
use crate::fs::{FileSystem, Session};
use crate::perm::Perm;
use crate::structs::EntryType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

fn term(err: io::Error) -> FsError {
    FsError::Terminal(err.kind())
}

/// Reads one line without its terminator, `None` at end of input.
fn read_line(input: &mut impl BufRead) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line).map_err(term)? == 0 {
        return Ok(None);
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Some(line))
}

fn ask(input: &mut impl BufRead, out: &mut impl Write, question: &str) -> Result<String> {
    write!(out, "{}", question).map_err(term)?;
    out.flush().map_err(term)?;
    read_line(input)?
        .map(|s| s.trim().to_string())
        .ok_or(FsError::Terminal(io::ErrorKind::UnexpectedEof))
}

fn ask_number<T: FromStr>(input: &mut impl BufRead, out: &mut impl Write, question: &str) -> Result<T> {
    loop {
        let answer = ask(input, out, question)?;
        match answer.parse() {
            Ok(value) => return Ok(value),
            Err(_) => writeln!(out, "Please enter a number.").map_err(term)?,
        }
    }
}

/// Prompts for a disk size and a user table, then formats a new image.
pub fn create_image(
    path: &Path,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<FileSystem<FileDisk>> {
    let size: u64 = ask_number(input, out, "Enter disk size (bytes): ")?;
    let count: usize = ask_number(input, out, "Enter user count: ")?;

    let mut users = Vec::with_capacity(count);
    for i in 0..count {
        writeln!(out, "User {}:", i + 1).map_err(term)?;
        let name = ask(input, out, "  Enter name: ")?;
        let password = ask(input, out, "  Enter password: ")?;
        users.push((name, password));
    }

    writeln!(out, "Creating disk on: {}", path.display()).map_err(term)?;
    let device = Arc::new(FileDisk::create(path, size)?);
    let users: Vec<(&str, &str)> = users
        .iter()
        .map(|(name, password)| (name.as_str(), password.as_str()))
        .collect();
    let fs = FileSystem::format(device, &users)?;
    writeln!(out, "Done!").map_err(term)?;
    Ok(fs)
}

/// Asks for credentials until they match a user.
pub fn login<D: BlockDevice>(
    fs: &FileSystem<D>,
    image: &str,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<Session<D>> {
    loop {
        let username = ask(input, out, &format!("{} login: ", image))?;
        let password = ask(input, out, "password: ")?;
        match fs.login(&username, &password) {
            Ok(session) => return Ok(session),
            Err(FsError::Auth) => {
                warn!("[login] rejected {}", username);
                writeln!(out, "Invalid login or password!").map_err(term)?;
            }
            Err(e) => return Err(e),
        }
    }
}

pub struct Shell<D: BlockDevice> {
    session: Session<D>,
    image: String,
}

impl<D: BlockDevice> Shell<D> {
    pub fn new(session: Session<D>, image: &str) -> Self {
        Self {
            session,
            image: image.to_string(),
        }
    }

    pub fn session(&self) -> &Session<D> {
        &self.session
    }

    pub fn prompt(&self) -> String {
        format!("{}@{}:{}$ ", self.session.username(), self.image, self.session.pwd())
    }

    /// Runs commands until `exit` or end of input.
    pub fn run(&mut self, input: &mut impl BufRead, out: &mut impl Write) -> Result<()> {
        loop {
            write!(out, "{}", self.prompt()).map_err(term)?;
            out.flush().map_err(term)?;
            let Some(line) = read_line(input)? else {
                writeln!(out).map_err(term)?;
                return Ok(());
            };
            if self.execute(&line, input, out)? == Flow::Exit {
                return Ok(());
            }
        }
    }

    /// Runs one command line. Only fatal errors are returned, everything
    /// else is reported on `out`.
    pub fn execute(
        &mut self,
        line: &str,
        input: &mut impl BufRead,
        out: &mut impl Write,
    ) -> Result<Flow> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }
        let (cmd, param) = match line.split_once(char::is_whitespace) {
            Some((cmd, param)) => (cmd, param.trim()),
            None => (line, ""),
        };

        let result = match cmd {
            "cd" => self.session.cd(param),
            "ls" => self.ls(param, out),
            "diskinfo" => self.diskinfo(out),
            "cat" => self.cat(param, out),
            "rm" => self.session.rm(param),
            "rmdir" => match param.strip_prefix("-r") {
                Some(rest) if rest.starts_with(char::is_whitespace) => {
                    self.session.rmdir_all(rest.trim())
                }
                _ => self.session.rmdir(param),
            },
            "mkdir" => self.session.mkdir(param).map(|_| ()),
            "cp" => two_args(param).and_then(|(src, dst)| self.session.cp(src, dst).map(|_| ())),
            "mv" => two_args(param).and_then(|(src, dst)| self.session.mv(src, dst)),
            "chmod" => two_args(param)
                .and_then(|(mode, path)| self.session.chmod(path, Perm::parse(mode)?)),
            "chown" => two_args(param).and_then(|(user, path)| self.session.chown(path, user)),
            "ed" => self.ed(param, input),
            "exit" => return Ok(Flow::Exit),
            _ => {
                writeln!(out, "The program '{}' is currently not installed.", cmd).map_err(term)?;
                return Ok(Flow::Continue);
            }
        };

        match result {
            Ok(()) => Ok(Flow::Continue),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("[shell] {}: {}", line, e);
                writeln!(out, "{}: {}", cmd, e).map_err(term)?;
                Ok(Flow::Continue)
            }
        }
    }

    fn ls(&self, param: &str, out: &mut impl Write) -> Result<()> {
        let listing = self.session.ls(param)?;
        let superblock = self.session.superblock()?;
        writeln!(out, "total {}", listing.len()).map_err(term)?;
        for row in listing {
            let owner = superblock
                .username(row.meta.owner)
                .unwrap_or_else(|| row.meta.owner.to_string());
            writeln!(
                out,
                "{}{} {:>4} {} {:>4} {} {} {}",
                if row.entry.ty == EntryType::File { '-' } else { 'd' },
                row.meta.perm.render(),
                row.entry.block,
                owner,
                row.size,
                row.meta.ctime,
                row.meta.mtime,
                row.entry.name(),
            )
            .map_err(term)?;
        }
        Ok(())
    }

    fn diskinfo(&self, out: &mut impl Write) -> Result<()> {
        let info = self.session.diskinfo()?;
        writeln!(out, "Total blocks: {}", info.total).map_err(term)?;
        writeln!(out, " Free blocks: {}", info.free).map_err(term)?;
        writeln!(out, " Used blocks: {}", info.used).map_err(term)
    }

    fn cat(&self, param: &str, out: &mut impl Write) -> Result<()> {
        let data = self.session.cat(param)?;
        out.write_all(&data).map_err(term)?;
        if !data.is_empty() && !data.ends_with(b"\n") {
            writeln!(out).map_err(term)?;
        }
        Ok(())
    }

    /// Collects lines up to a lone `.` and stores them as the file content.
    fn ed(&self, param: &str, input: &mut impl BufRead) -> Result<()> {
        if param.is_empty() {
            return Err(FsError::InvalidPath);
        }
        let mut data = Vec::with_capacity(BLOCK_SIZE);
        while let Some(line) = read_line(input)? {
            if line == "." {
                break;
            }
            data.extend_from_slice(line.as_bytes());
            data.push(b'\n');
        }
        self.session.write(param, &data)?;
        info!("[ed] {} ({} bytes)", param, data.len());
        Ok(())
    }
}

fn two_args(param: &str) -> Result<(&str, &str)> {
    let mut parts = param.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), None) => Ok((a, b)),
        _ => Err(FsError::InvalidPath),
    }
}
