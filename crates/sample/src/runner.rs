use std::io::Write;

use apiary_builder::{PreparedServer, RunError, ServerRunner};

/// Resolves every served handler and writes the resulting API surface.
pub struct ReportRunner<W> {
	out: W,
}

impl<W: Write> ReportRunner<W> {
	pub fn new(out: W) -> Self {
		Self { out }
	}

	pub fn into_inner(self) -> W {
		self.out
	}
}

impl<W: Write> ServerRunner for ReportRunner<W> {
	fn run(&mut self, server: PreparedServer) -> Result<(), RunError> {
		let options = &server.options;
		writeln!(self.out, "serving on {}:{}", options.bind_address, options.secure_port)?;
		writeln!(self.out, "etcd {} under {}", options.etcd_servers.join(","), options.etcd_prefix)?;

		for (group, versions) in server.description.version_priorities() {
			writeln!(self.out, "group {group}: {}", versions.join(" > "))?;
		}
		for (resource, handler) in server.install_apis()? {
			tracing::debug!(%resource, kind = handler.kind(), "installed");
			writeln!(self.out, "  {resource} -> {} {:?}", handler.kind(), handler.capabilities())?;
		}
		Ok(())
	}
}
