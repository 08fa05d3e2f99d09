bitflags::bitflags! {
	/// A set of declared resource capabilities.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct CapabilitySet: u32 {
		/// Serves create requests directly.
		const CREATE = 1 << 0;
		/// Serves update requests directly.
		const UPDATE = 1 << 1;
		/// Serves get requests directly.
		const GET = 1 << 2;
		/// Serves list requests directly.
		const LIST = 1 << 3;
		/// Serves delete requests directly.
		const DELETE = 1 << 4;
		/// Serves watch requests directly.
		const WATCH = 1 << 5;
		/// Has a status sub-resource.
		const STATUS = 1 << 6;
		/// Provides version-specific field defaults.
		const DEFAULTS = 1 << 7;

		/// Any of these makes a type its own request handler.
		const SERVING = Self::CREATE.bits() | Self::UPDATE.bits() | Self::GET.bits() | Self::LIST.bits();
	}
}

impl CapabilitySet {
	/// Returns true if the set declares any capability that makes a type serve itself.
	pub const fn is_self_serving(self) -> bool {
		self.intersects(Self::SERVING)
	}
}
