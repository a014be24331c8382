#[macro_export]
/// int_enum declares an enum backed by an integer wire representation
/// that can be read from and written to a byte stream.
macro_rules! int_enum {
    (
        $(#[$outer:meta])*
        $v:vis enum $EnumName:ident : $Type:ty {
            $(
                $(#[$inner:ident $($args:tt)*])*
                $Variant:ident = $Value:expr,
            )+
        }
    ) => {
        $(#[$outer])*
        $v enum $EnumName {
            $(
                $(#[$inner $($args)*])*
                $Variant,
            )+
        }

        impl ::std::convert::TryFrom<$Type> for $EnumName {
            type Error = $Type;

            fn try_from(value: $Type) -> Result<Self, $Type> {
                match value {
                    $(
                        $Value => Ok($EnumName::$Variant),
                    )+
                    _ => Err(value),
                }
            }
        }

        impl From<&$EnumName> for $Type {
            fn from(e: &$EnumName) -> $Type {
                match e {
                    $(
                        $EnumName::$Variant => $Value,
                    )+
                }
            }
        }

        impl ::wirestruct::Size for $EnumName {
            fn size(&self) -> usize {
                let val: $Type = self.into();
                ::wirestruct::Size::size(&val)
            }
        }

        impl ::wirestruct::ReadFrom for $EnumName {
            fn read_from<T: ::std::io::Read>(source: &mut T) -> ::std::io::Result<Self> {
                let val = <$Type as ::wirestruct::ReadFrom>::read_from(source)?;

                match val {
                    $(
                        $Value => Ok($EnumName::$Variant),
                    )+
                    _ => {
                        Err(::std::io::Error::new(::std::io::ErrorKind::InvalidData, format!("invalid value for {}: {}", stringify!($EnumName), val)))
                    }
                }
            }
        }

        impl ::wirestruct::WriteTo for $EnumName {
            fn write_to<W: ::std::io::Write>(&self, writer: &mut W) -> ::std::io::Result<()> {
                let val: $Type = match self {
                    $(
                        $EnumName::$Variant => $Value,
                    )+
                };

                ::wirestruct::WriteTo::write_to(&val, writer)
            }
        }
    }
}
