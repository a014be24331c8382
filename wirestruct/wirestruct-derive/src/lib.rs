extern crate proc_macro2;

use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput};

#[proc_macro_derive(WireStruct)]
pub fn derive_wire_struct(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
	let input = parse_macro_input!(input as DeriveInput);

	let name = input.ident;

	if let Data::Struct(data) = &input.data {
		let mut read_fields = Vec::new();
		let mut write_fields = Vec::new();

		for field in data.fields.iter() {
			let name = field.ident.as_ref().unwrap();
			let ty = &field.ty;

			read_fields.push(quote! {
				let #name = <#ty as ::wirestruct::ReadFrom>::read_from(source)?;
			});

			write_fields.push(quote! {
				<#ty as ::wirestruct::WriteTo>::write_to(&self.#name, writer)?;
			});
		}

		let names = data.fields.iter().map(|field| {
			let name = field.ident.as_ref().unwrap();
			quote! {#name}
		});

		let gen = quote! {
			impl ::wirestruct::ReadFrom for #name {
				fn read_from<T: ::std::io::Read>(source: &mut T) -> ::std::io::Result<Self> where Self: Sized {
					#(#read_fields)*
					Ok(Self {
						#(#names),*
					})
				}
			}

			impl ::wirestruct::WriteTo for #name {
				fn write_to<W: ::std::io::Write>(&self, writer: &mut W) -> ::std::io::Result<()> {
					#(#write_fields)*
					Ok(())
				}
			}
		};

		gen.into()
	} else {
		panic!("Only structs are supported")
	}
}

#[proc_macro_derive(Size)]
pub fn derive_size(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
	let input = parse_macro_input!(input as DeriveInput);

	let name = input.ident;

	if let Data::Struct(data) = &input.data {
		let size = data.fields.iter().map(|field| {
			let ty = &field.ty;
			let name = field.ident.as_ref().unwrap();

			quote! {
				<#ty as ::wirestruct::Size>::size(&self.#name)
			}
		});

		let gen = quote! {
			impl ::wirestruct::Size for #name {
				fn size(&self) -> usize {
					0 #(+ #size)*
				}
			}
		};

		gen.into()
	} else {
		panic!("Only structs are supported")
	}
}
