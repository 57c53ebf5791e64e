use clap::{arg,crate_version,Command};
use std::io::{Seek,SeekFrom};
use huffpack::{huffman,BitReader,Bit,CodeTable,HuffTree,Symbol};
use huffpack::tools::huff_tree::make_freq_table;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

const RCH: &str = "unreachable was reached";

fn ok_to_overwrite(path_out: &str) -> bool {
    if let Ok(_f) = std::fs::File::open(path_out) {
        let mut ans = String::new();
        eprint!("{} exists, overwrite? (y/n) ",path_out);
        std::io::stdin().read_line(&mut ans).expect("could not read stdin");
        if ans.trim_end()=="y" || ans.trim_end()=="Y" {
            return true;
        }
        return false;
    }
    true
}

fn symbol_label(sym: &Symbol) -> String {
    match sym {
        Symbol::Byte(val) if val.is_ascii_graphic() => format!("{:#04x} '{}'",val,*val as char),
        Symbol::Byte(val) => format!("{:#04x}",val),
        Symbol::EndMessage => "end".to_string()
    }
}

fn main() -> STDRESULT
{
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let long_help =
"Examples:
---------
Compress:      `huffpack compress -i my_expanded -o my_compressed`
Expand:        `huffpack expand -i my_compressed -o my_expanded`
Show codes:    `huffpack codes -i my_compressed`";

    let mut main_cmd = Command::new("huffpack")
        .about("Compress and expand with static Huffman codes")
        .after_long_help(long_help)
        .version(crate_version!());
    main_cmd = main_cmd.subcommand(Command::new("compress")
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .arg(arg!(-c --chunk <BYTES> "bytes to read at a time").value_parser(clap::value_parser!(usize))
            .required(false))
        .about("compress a file"));

    main_cmd = main_cmd.subcommand(Command::new("expand")
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .about("expand a file"));

    main_cmd = main_cmd.subcommand(Command::new("codes")
        .arg(arg!(-i --input <PATH> "compressed input path").required(true))
        .about("print the code table stored in a compressed file"));

    let matches = main_cmd.get_matches();

    if let Some(cmd) = matches.subcommand_matches("compress") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        let mut opt = huffman::STD_OPTIONS;
        if let Some(chunk_size) = cmd.get_one::<usize>("chunk") {
            opt.chunk_size = *chunk_size;
        }
        if !ok_to_overwrite(path_out) {
            eprintln!("abort operation");
            return Ok(());
        }
        let mut in_file = std::fs::File::open(path_in)?;
        let freq = make_freq_table(&mut in_file)?;
        let tree = HuffTree::from_frequencies(&freq);
        log::info!("tree has {} leaves",tree.leaf_count());
        in_file.seek(SeekFrom::Start(0))?;
        let mut out_file = std::fs::OpenOptions::new().write(true).truncate(false).create(true).open(path_out)?;
        let (in_size,out_size) = huffman::compress(&tree,&mut in_file,&mut out_file,&opt)?;
        out_file.set_len(out_size)?;
        eprintln!("compressed {} into {}",in_size,out_size);
    }

    if let Some(cmd) = matches.subcommand_matches("expand") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        if !ok_to_overwrite(path_out) {
            eprintln!("abort operation");
            return Ok(());
        }
        let mut in_file = std::fs::File::open(path_in)?;
        let mut out_file = std::fs::OpenOptions::new().write(true).truncate(false).create(true).open(path_out)?;
        let (in_size,out_size) = huffman::expand(&mut in_file,&mut out_file)?;
        out_file.set_len(out_size)?;
        eprintln!("expanded {} into {}",in_size,out_size);
    }

    if let Some(cmd) = matches.subcommand_matches("codes") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let in_file = std::fs::File::open(path_in)?;
        let mut reader = BitReader::new(in_file);
        let tree = huffman::read_tree(&mut reader)?;
        let codes = CodeTable::from_tree(&tree);
        for (sym,code) in codes.entries() {
            let bits: String = code.iter().map(|b| match b {
                Bit::Zero => '0',
                Bit::One => '1'
            }).collect();
            println!("{:12} {}",symbol_label(&sym),bits);
        }
    }

    Ok(())
}
