//! The built-in library bundle: a fixed set of registry-shaped sources
//! registered as libraries when the driver is constructed with
//! `add_standard_sources`. Libraries never serve as topological roots, so
//! these are parsed on every run but resolved and compiled only when
//! imported.

pub const STANDARD_SOURCES: &[(&str, &str)] = &[
    (
        "owned",
        "contract owned {\n\
         \x20   address owner;\n\
         \x20   constructor() { owner = msg.sender; }\n\
         }\n",
    ),
    (
        "mortal",
        "import \"owned\";\n\
         contract mortal is owned {\n\
         \x20   function kill() public {\n\
         \x20       if (msg.sender == owner) { selfdestruct(owner); }\n\
         \x20   }\n\
         }\n",
    ),
    (
        "Config",
        "contract Config {\n\
         \x20   address owner;\n\
         \x20   address nameReg;\n\
         \x20   address coinReg;\n\
         \x20   constructor() { owner = msg.sender; }\n\
         \x20   function register(uint256 id, address addr) public {\n\
         \x20       if (msg.sender == owner) {\n\
         \x20           if (id == 1) { nameReg = addr; }\n\
         \x20           if (id == 3) { coinReg = addr; }\n\
         \x20       }\n\
         \x20   }\n\
         \x20   function unregister(uint256 id) public {\n\
         \x20       if (msg.sender == owner) {\n\
         \x20           if (id == 1) { nameReg = address(0); }\n\
         \x20           if (id == 3) { coinReg = address(0); }\n\
         \x20       }\n\
         \x20   }\n\
         \x20   function lookup(uint256 id) public returns (address) {\n\
         \x20       if (id == 1) { return nameReg; }\n\
         \x20       if (id == 3) { return coinReg; }\n\
         \x20       return address(0);\n\
         \x20   }\n\
         \x20   function kill() public {\n\
         \x20       if (msg.sender == owner) { selfdestruct(owner); }\n\
         \x20   }\n\
         }\n",
    ),
    (
        "configUser",
        "contract configUser {\n\
         \x20   function configAddr() public returns (address) {\n\
         \x20       return address(0xc6d9d2cd449a754c494264e1809c50e34d64562b);\n\
         \x20   }\n\
         }\n",
    ),
    (
        "NameReg",
        "contract NameReg {\n\
         \x20   address owner;\n\
         \x20   bytes32 lastName;\n\
         \x20   address lastOwner;\n\
         \x20   constructor() { owner = msg.sender; }\n\
         \x20   function register(bytes32 name) public {\n\
         \x20       lastName = name;\n\
         \x20       lastOwner = msg.sender;\n\
         \x20   }\n\
         \x20   function unregister() public {\n\
         \x20       if (msg.sender == lastOwner) {\n\
         \x20           lastName = bytes32(0);\n\
         \x20           lastOwner = address(0);\n\
         \x20       }\n\
         \x20   }\n\
         \x20   function nameOf(address addr) public returns (bytes32) {\n\
         \x20       if (addr == lastOwner) { return lastName; }\n\
         \x20       return bytes32(0);\n\
         \x20   }\n\
         \x20   function addressOf(bytes32 name) public returns (address) {\n\
         \x20       if (name == lastName) { return lastOwner; }\n\
         \x20       return address(0);\n\
         \x20   }\n\
         }\n",
    ),
    (
        "CoinReg",
        "contract CoinReg {\n\
         \x20   uint256 count;\n\
         \x20   bytes32 lastName;\n\
         \x20   uint256 lastDenom;\n\
         \x20   function register(bytes32 name, uint256 denom) public {\n\
         \x20       lastName = name;\n\
         \x20       lastDenom = denom;\n\
         \x20       count = count + 1;\n\
         \x20   }\n\
         \x20   function unregister() public {\n\
         \x20       if (count > 0) { count = count - 1; }\n\
         \x20   }\n\
         \x20   function total() public returns (uint256) { return count; }\n\
         }\n",
    ),
    (
        "named",
        "import \"Config\";\n\
         import \"NameReg\";\n\
         import \"configUser\";\n\
         contract named is configUser {\n\
         \x20   bytes32 name;\n\
         \x20   constructor(bytes32 n) { name = n; }\n\
         }\n",
    ),
    (
        "service",
        "import \"Config\";\n\
         import \"configUser\";\n\
         contract service is configUser {\n\
         \x20   uint256 serviceId;\n\
         \x20   constructor(uint256 n) { serviceId = n; }\n\
         }\n",
    ),
    (
        "std",
        "import \"owned\";\n\
         import \"mortal\";\n\
         import \"Config\";\n\
         import \"configUser\";\n\
         import \"NameReg\";\n\
         import \"named\";\n",
    ),
];

/// Whether a source name belongs to the built-in bundle. The default
/// contract lookup skips these.
pub fn is_standard_source(name: &str) -> bool {
    STANDARD_SOURCES.iter().any(|(known, _)| *known == name)
}
