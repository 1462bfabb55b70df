//! Sample documents shared by the unit tests

use crate::parser::parse_document;
use crate::types::EntityIndex;

/// A small app project exactly as the serializer lays it out
pub const SAMPLE_PROJECT: &str = r##"// !$*UTF8*$!
{
	archiveVersion = 1;
	classes = {
	};
	objectVersion = 56;
	objects = {

/* Begin PBXBuildFile section */
		1A0000000000000000000001 /* ContentView.swift in Sources */ = {isa = PBXBuildFile; fileRef = 2B0000000000000000000001 /* ContentView.swift */; };
		1A0000000000000000000002 /* Audio.swift in Sources */ = {isa = PBXBuildFile; fileRef = 2B0000000000000000000002 /* Audio.swift */; };
		1A0000000000000000000003 /* Assets.xcassets in Resources */ = {isa = PBXBuildFile; fileRef = 2B0000000000000000000003 /* Assets.xcassets */; };
/* End PBXBuildFile section */

/* Begin PBXFileReference section */
		2B0000000000000000000001 /* ContentView.swift */ = {isa = PBXFileReference; lastKnownFileType = sourcecode.swift; path = ContentView.swift; sourceTree = "<group>"; };
		2B0000000000000000000002 /* Audio.swift */ = {isa = PBXFileReference; lastKnownFileType = sourcecode.swift; path = Audio.swift; sourceTree = "<group>"; };
		2B0000000000000000000003 /* Assets.xcassets */ = {isa = PBXFileReference; lastKnownFileType = folder.assetcatalog; path = Assets.xcassets; sourceTree = "<group>"; };
		2B0000000000000000000004 /* Info.plist */ = {isa = PBXFileReference; lastKnownFileType = text.plist.xml; path = Info.plist; sourceTree = "<group>"; };
		2B0000000000000000000005 /* Reverb.app */ = {isa = PBXFileReference; explicitFileType = wrapper.application; includeInIndex = 0; path = Reverb.app; sourceTree = BUILT_PRODUCTS_DIR; };
/* End PBXFileReference section */

/* Begin PBXFrameworksBuildPhase section */
		4D0000000000000000000003 /* Frameworks */ = {
			isa = PBXFrameworksBuildPhase;
			buildActionMask = 2147483647;
			files = (
			);
			runOnlyForDeploymentPostprocessing = 0;
		};
/* End PBXFrameworksBuildPhase section */

/* Begin PBXGroup section */
		3C0000000000000000000001 = {
			isa = PBXGroup;
			children = (
				3C0000000000000000000002 /* Reverb */,
				3C0000000000000000000003 /* Products */,
			);
			sourceTree = "<group>";
		};
		3C0000000000000000000002 /* Reverb */ = {
			isa = PBXGroup;
			children = (
				2B0000000000000000000001 /* ContentView.swift */,
				3C0000000000000000000004 /* Services */,
				2B0000000000000000000003 /* Assets.xcassets */,
				2B0000000000000000000004 /* Info.plist */,
			);
			path = Reverb;
			sourceTree = "<group>";
		};
		3C0000000000000000000003 /* Products */ = {
			isa = PBXGroup;
			children = (
				2B0000000000000000000005 /* Reverb.app */,
			);
			name = Products;
			sourceTree = "<group>";
		};
		3C0000000000000000000004 /* Services */ = {
			isa = PBXGroup;
			children = (
				2B0000000000000000000002 /* Audio.swift */,
			);
			path = Services;
			sourceTree = "<group>";
		};
/* End PBXGroup section */

/* Begin PBXNativeTarget section */
		5E0000000000000000000001 /* Reverb */ = {
			isa = PBXNativeTarget;
			buildConfigurationList = 7A0000000000000000000002 /* Build configuration list for PBXNativeTarget "Reverb" */;
			buildPhases = (
				4D0000000000000000000001 /* Sources */,
				4D0000000000000000000003 /* Frameworks */,
				4D0000000000000000000002 /* Resources */,
				4D0000000000000000000004 /* ShellScript */,
			);
			buildRules = (
			);
			dependencies = (
			);
			name = Reverb;
			productName = Reverb;
			productReference = 2B0000000000000000000005 /* Reverb.app */;
			productType = "com.apple.product-type.application";
		};
/* End PBXNativeTarget section */

/* Begin PBXProject section */
		6F0000000000000000000001 /* Project object */ = {
			isa = PBXProject;
			attributes = {
				BuildIndependentTargetsInParallel = 1;
				LastSwiftUpdateCheck = 1500;
				LastUpgradeCheck = 1500;
				TargetAttributes = {
					5E0000000000000000000001 = {
						CreatedOnToolsVersion = 15.0;
					};
				};
			};
			buildConfigurationList = 7A0000000000000000000001 /* Build configuration list for PBXProject "Reverb" */;
			compatibilityVersion = "Xcode 14.0";
			developmentRegion = en;
			hasScannedForEncodings = 0;
			knownRegions = (
				en,
				Base,
			);
			mainGroup = 3C0000000000000000000001;
			productRefGroup = 3C0000000000000000000003 /* Products */;
			projectDirPath = "";
			projectRoot = "";
			targets = (
				5E0000000000000000000001 /* Reverb */,
			);
		};
/* End PBXProject section */

/* Begin PBXResourcesBuildPhase section */
		4D0000000000000000000002 /* Resources */ = {
			isa = PBXResourcesBuildPhase;
			buildActionMask = 2147483647;
			files = (
				1A0000000000000000000003 /* Assets.xcassets in Resources */,
			);
			runOnlyForDeploymentPostprocessing = 0;
		};
/* End PBXResourcesBuildPhase section */

/* Begin PBXShellScriptBuildPhase section */
		4D0000000000000000000004 /* ShellScript */ = {
			isa = PBXShellScriptBuildPhase;
			buildActionMask = 2147483647;
			files = (
			);
			inputPaths = (
			);
			outputPaths = (
			);
			runOnlyForDeploymentPostprocessing = 0;
			shellPath = /bin/sh;
			shellScript = "echo \"lint\"\n";
		};
/* End PBXShellScriptBuildPhase section */

/* Begin PBXSourcesBuildPhase section */
		4D0000000000000000000001 /* Sources */ = {
			isa = PBXSourcesBuildPhase;
			buildActionMask = 2147483647;
			files = (
				1A0000000000000000000001 /* ContentView.swift in Sources */,
				1A0000000000000000000002 /* Audio.swift in Sources */,
			);
			runOnlyForDeploymentPostprocessing = 0;
		};
/* End PBXSourcesBuildPhase section */

/* Begin XCBuildConfiguration section */
		8B0000000000000000000001 /* Debug */ = {
			isa = XCBuildConfiguration;
			buildSettings = {
				ALWAYS_SEARCH_USER_PATHS = NO;
				ONLY_ACTIVE_ARCH = YES;
				SDKROOT = iphoneos;
			};
			name = Debug;
		};
		8B0000000000000000000002 /* Release */ = {
			isa = XCBuildConfiguration;
			buildSettings = {
				ALWAYS_SEARCH_USER_PATHS = NO;
				SDKROOT = iphoneos;
				VALIDATE_PRODUCT = YES;
			};
			name = Release;
		};
		8B0000000000000000000003 /* Debug */ = {
			isa = XCBuildConfiguration;
			buildSettings = {
				INFOPLIST_FILE = Reverb/Info.plist;
				PRODUCT_BUNDLE_IDENTIFIER = com.quran.Reverb;
				PRODUCT_NAME = "$(TARGET_NAME)";
				SWIFT_VERSION = 5.0;
			};
			name = Debug;
		};
		8B0000000000000000000004 /* Release */ = {
			isa = XCBuildConfiguration;
			buildSettings = {
				INFOPLIST_FILE = Reverb/Info.plist;
				PRODUCT_BUNDLE_IDENTIFIER = com.quran.Reverb;
				PRODUCT_NAME = "$(TARGET_NAME)";
				SWIFT_VERSION = 5.0;
			};
			name = Release;
		};
/* End XCBuildConfiguration section */

/* Begin XCConfigurationList section */
		7A0000000000000000000001 /* Build configuration list for PBXProject "Reverb" */ = {
			isa = XCConfigurationList;
			buildConfigurations = (
				8B0000000000000000000001 /* Debug */,
				8B0000000000000000000002 /* Release */,
			);
			defaultConfigurationIsVisible = 0;
			defaultConfigurationName = Release;
		};
		7A0000000000000000000002 /* Build configuration list for PBXNativeTarget "Reverb" */ = {
			isa = XCConfigurationList;
			buildConfigurations = (
				8B0000000000000000000003 /* Debug */,
				8B0000000000000000000004 /* Release */,
			);
			defaultConfigurationIsVisible = 0;
			defaultConfigurationName = Release;
		};
/* End XCConfigurationList section */
	};
	rootObject = 6F0000000000000000000001 /* Project object */;
}
"##;

/// Parse a fixture, failing the test on a fatal error
pub fn parse_fixture(text: &str) -> EntityIndex {
    match parse_document(text) {
        Ok(doc) => doc.index,
        Err(e) => panic!("fixture failed to parse: {}", e),
    }
}
