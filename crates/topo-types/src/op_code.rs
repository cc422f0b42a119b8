//! Short operation codes embedded into mapped names as provenance.

pub const MAKER: &str = "MAK";
pub const COMPOUND: &str = "CMP";
pub const COMPSOLID: &str = "CSD";
pub const FUSE: &str = "FUS";
pub const CUT: &str = "CUT";
pub const COMMON: &str = "CMN";
pub const EXTRUDE: &str = "XTR";
pub const REVOLVE: &str = "RVL";
pub const FILLET: &str = "FLT";
pub const CHAMFER: &str = "CHF";
pub const MIRROR: &str = "MIR";
pub const MOVE: &str = "MOV";
pub const COPY: &str = "CPY";
pub const SHELL: &str = "SHL";
pub const SOLID: &str = "SLD";
pub const WIRE: &str = "WIR";
pub const FACE: &str = "FAC";
