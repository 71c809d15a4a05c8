pub use self::xml::XmlEncoder;

mod util;
mod xml;
