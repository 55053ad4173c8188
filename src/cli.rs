use clap::{Arg, Command, ArgAction};
use log::debug;

pub fn build_cli() -> Command {
    debug!("⚙️ Building CLI interface...");
    Command::new("rtsp-recorder")
        .version("0.1.0")
        .author("RTSP Recorder Developers")
        .about("Records groups of RTSP cameras to disk through ffmpeg, one process per camera.")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Sets a custom application configuration file (YAML)")
                .global(true)
                .action(ArgAction::Set)
        )
        .arg(
            Arg::new("settings")
                .short('s')
                .long("settings")
                .value_name("FILE")
                .help("Camera settings file (JSON: group -> [{URL, Save_name}])")
                .global(true)
                .action(ArgAction::Set)
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .help("Enable debug logging")
                .global(true)
                .action(ArgAction::SetTrue)
        )
        .subcommand(
            Command::new("groups")
                .about("Lists the camera groups and cameras of the settings file")
        )
        .subcommand(
            Command::new("record")
                .about("Records every camera of a group until Ctrl-C or the duration elapses")
                .arg(Arg::new("group").short('g').long("group").value_name("GROUP").required(true).help("Camera group to record").action(ArgAction::Set))
                .arg(Arg::new("container").long("container").value_name("EXT").help("Container format / file extension, e.g. mp4 or mkv (default from config)").action(ArgAction::Set))
                .arg(Arg::new("duration").long("duration").value_name("SECONDS").help("Stop automatically after this many seconds").value_parser(clap::value_parser!(u64)).action(ArgAction::Set))
        )
        .subcommand(
            Command::new("console")
                .about("Interactive recorder: start, stop, status and preview from stdin commands")
        )
        .subcommand(
            Command::new("preview")
                .about("Opens a live preview window for one camera")
                .arg(Arg::new("group").short('g').long("group").value_name("GROUP").required(true).help("Camera group").action(ArgAction::Set))
                .arg(Arg::new("camera").long("camera").value_name("SAVE_NAME").required(true).help("Camera Save_name within the group").action(ArgAction::Set))
        )
        .subcommand(
            Command::new("probe")
                .about("Probes the video stream of every camera in a group")
                .arg(Arg::new("group").short('g').long("group").value_name("GROUP").required(true).help("Camera group").action(ArgAction::Set))
        )
        .subcommand(
            Command::new("check")
                .about("Checks that the media tools are installed and the output folder is usable")
        )
}
